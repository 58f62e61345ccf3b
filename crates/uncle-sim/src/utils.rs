//! Helper functions and data types

use std::sync::Arc;

/// A named, shareable function of one argument. Comparisons and hashing only
/// look at the name.
#[derive(Clone)]
pub struct WrapFunc<Input, Output> {
    name: String,
    func: Arc<dyn Fn(Input) -> Output + Send + Sync + 'static>,
}

/// Creates a [`WrapFunc`] from a name and a closure.
macro_rules! wrap {
    ($name:expr, $func:expr) => {
        $crate::utils::WrapFunc::new($name, $func)
    };
}

pub(crate) use wrap;

impl<I, O> WrapFunc<I, O> {
    pub fn new<N, F>(name: N, func: F) -> Self
    where
        N: Into<String>,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        Self { name: name.into(), func: Arc::new(func) }
    }

    pub fn call(&self, input: I) -> O {
        (self.func)(input)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<I, O> std::fmt::Debug for WrapFunc<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<WrapFunc: {}>", self.name)
    }
}

impl<I, O> PartialEq for WrapFunc<I, O> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<I, O> Eq for WrapFunc<I, O> {}

impl<I, O> PartialOrd for WrapFunc<I, O> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<I, O> Ord for WrapFunc<I, O> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

impl<I, O> std::hash::Hash for WrapFunc<I, O> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Median of `values`, taking the mean of the two middle values when there
/// is an even number of them. NaN values sort last.
///
/// ## Panics
/// If `values` is empty.
pub fn median_of_floats(mut values: Vec<f64>) -> f64 {
    assert!(!values.is_empty(), "median of empty list");

    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::{median_of_floats, wrap};

    #[test]
    fn median() {
        assert_eq!(median_of_floats(vec![3.0]), 3.0);
        assert_eq!(median_of_floats(vec![5.0, 1.0, 3.0]), 3.0);
        assert_eq!(median_of_floats(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn wrapped_funcs_compare_by_name() {
        let double = wrap!("double", |x: f64| 2.0 * x);
        let also_double = wrap!("double", |x: f64| x + x);
        let half = wrap!("half", |x: f64| x / 2.0);

        assert_eq!(double.call(1.5), 3.0);
        assert_eq!(double, also_double);
        assert!(double < half);
        assert_eq!(format!("{half:?}"), "<WrapFunc: half>");
    }
}
