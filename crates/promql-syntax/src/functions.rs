//! Built-in PromQL functions and aggregation operators.
//!
//! The tables drive argument checking as well as hover text and completion.

use crate::ast::ValueType::{Matrix as M, Scalar as S, String as Str, Vector as V};
use crate::ast::{AggregateOp, ValueType};

/// Signature and documentation of a built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Function {
    /// Function name.
    pub name: &'static str,
    /// Argument types, trailing optional ones included.
    pub arg_types: &'static [ValueType],
    /// Number of trailing optional arguments; `None` when the last argument
    /// may repeat any number of times.
    pub optional_args: Option<usize>,
    /// Result type.
    pub return_type: ValueType,
    /// One-line description.
    pub doc: &'static str,
}

impl Function {
    /// Smallest accepted number of arguments.
    pub const fn min_args(&self) -> usize {
        match self.optional_args {
            Some(n) => self.arg_types.len() - n,
            None => self.arg_types.len() - 1,
        }
    }

    /// Largest accepted number of arguments, `None` when unbounded.
    pub const fn max_args(&self) -> Option<usize> {
        match self.optional_args {
            Some(_) => Some(self.arg_types.len()),
            None => None,
        }
    }

    /// Expected type of the argument at `index`.
    pub fn arg_type(&self, index: usize) -> Option<ValueType> {
        match self.arg_types.get(index) {
            Some(ty) => Some(*ty),
            None if self.optional_args.is_none() => self.arg_types.last().copied(),
            None => None,
        }
    }

    /// Signature line such as `rate(range vector) -> instant vector`.
    pub fn signature(&self) -> String {
        let min = self.min_args();
        let mut args: Vec<String> = self
            .arg_types
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                if i >= min {
                    format!("[{ty}]")
                } else {
                    ty.to_string()
                }
            })
            .collect();
        if self.optional_args.is_none() {
            if let Some(last) = args.last_mut() {
                last.push_str(", ...");
            }
        }
        format!("{}({}) -> {}", self.name, args.join(", "), self.return_type)
    }
}

const fn f(
    name: &'static str,
    arg_types: &'static [ValueType],
    optional_args: Option<usize>,
    return_type: ValueType,
    doc: &'static str,
) -> Function {
    Function {
        name,
        arg_types,
        optional_args,
        return_type,
        doc,
    }
}

/// All built-in functions, sorted by name.
#[rustfmt::skip]
pub static FUNCTIONS: &[Function] = &[
    f("abs", &[V], Some(0), V, "Absolute value of all sample values."),
    f("absent", &[V], Some(0), V, "Returns a 1-element vector if the input vector has no elements."),
    f("absent_over_time", &[M], Some(0), V, "Returns a 1-element vector if the range vector has no elements."),
    f("acos", &[V], Some(0), V, "Arccosine of all sample values."),
    f("acosh", &[V], Some(0), V, "Inverse hyperbolic cosine of all sample values."),
    f("asin", &[V], Some(0), V, "Arcsine of all sample values."),
    f("asinh", &[V], Some(0), V, "Inverse hyperbolic sine of all sample values."),
    f("atan", &[V], Some(0), V, "Arctangent of all sample values."),
    f("atanh", &[V], Some(0), V, "Inverse hyperbolic tangent of all sample values."),
    f("avg_over_time", &[M], Some(0), V, "Average value of all points in the specified interval."),
    f("ceil", &[V], Some(0), V, "Rounds sample values up to the nearest integer."),
    f("changes", &[M], Some(0), V, "Number of times the value changed within the range."),
    f("clamp", &[V, S, S], Some(0), V, "Clamps sample values to a lower and an upper limit."),
    f("clamp_max", &[V, S], Some(0), V, "Clamps sample values to an upper limit."),
    f("clamp_min", &[V, S], Some(0), V, "Clamps sample values to a lower limit."),
    f("cos", &[V], Some(0), V, "Cosine of all sample values."),
    f("cosh", &[V], Some(0), V, "Hyperbolic cosine of all sample values."),
    f("count_over_time", &[M], Some(0), V, "Count of all values in the specified interval."),
    f("day_of_month", &[V], Some(1), V, "Day of the month for each timestamp in UTC."),
    f("day_of_week", &[V], Some(1), V, "Day of the week for each timestamp in UTC."),
    f("day_of_year", &[V], Some(1), V, "Day of the year for each timestamp in UTC."),
    f("days_in_month", &[V], Some(1), V, "Number of days in the month for each timestamp in UTC."),
    f("deg", &[V], Some(0), V, "Converts radians to degrees."),
    f("delta", &[M], Some(0), V, "Difference between the first and last value of each series in the range."),
    f("deriv", &[M], Some(0), V, "Per-second derivative using simple linear regression."),
    f("double_exponential_smoothing", &[M, S, S], Some(0), V, "Smoothed value based on the range, a smoothing factor and a trend factor."),
    f("exp", &[V], Some(0), V, "Exponential function of all sample values."),
    f("floor", &[V], Some(0), V, "Rounds sample values down to the nearest integer."),
    f("histogram_avg", &[V], Some(0), V, "Arithmetic average of observed values in native histograms."),
    f("histogram_count", &[V], Some(0), V, "Count of observations in native histograms."),
    f("histogram_fraction", &[S, S, V], Some(0), V, "Estimated fraction of observations between two values."),
    f("histogram_quantile", &[S, V], Some(0), V, "Calculates the φ-quantile from a histogram."),
    f("histogram_stddev", &[V], Some(0), V, "Estimated standard deviation of observations in native histograms."),
    f("histogram_stdvar", &[V], Some(0), V, "Estimated standard variance of observations in native histograms."),
    f("histogram_sum", &[V], Some(0), V, "Sum of observations in native histograms."),
    f("holt_winters", &[M, S, S], Some(0), V, "Smoothed value based on the range (renamed double_exponential_smoothing)."),
    f("hour", &[V], Some(1), V, "Hour of the day for each timestamp in UTC."),
    f("idelta", &[M], Some(0), V, "Difference between the last two samples in the range."),
    f("increase", &[M], Some(0), V, "Increase in the time series in the range vector."),
    f("irate", &[M], Some(0), V, "Per-second instant rate based on the last two data points."),
    f("label_join", &[V, Str, Str, Str], None, V, "Joins the values of source labels into a destination label."),
    f("label_replace", &[V, Str, Str, Str, Str], Some(0), V, "Writes a regex replacement of a source label into a destination label."),
    f("last_over_time", &[M], Some(0), V, "Most recent point value in the specified interval."),
    f("ln", &[V], Some(0), V, "Natural logarithm of all sample values."),
    f("log10", &[V], Some(0), V, "Decimal logarithm of all sample values."),
    f("log2", &[V], Some(0), V, "Binary logarithm of all sample values."),
    f("mad_over_time", &[M], Some(0), V, "Median absolute deviation of all points in the specified interval."),
    f("max_over_time", &[M], Some(0), V, "Maximum value of all points in the specified interval."),
    f("min_over_time", &[M], Some(0), V, "Minimum value of all points in the specified interval."),
    f("minute", &[V], Some(1), V, "Minute of the hour for each timestamp in UTC."),
    f("month", &[V], Some(1), V, "Month of the year for each timestamp in UTC."),
    f("pi", &[], Some(0), S, "Returns pi."),
    f("predict_linear", &[M, S], Some(0), V, "Predicts the value of the series t seconds from now."),
    f("present_over_time", &[M], Some(0), V, "Value 1 for any series in the specified interval."),
    f("quantile_over_time", &[S, M], Some(0), V, "The φ-quantile of the values in the specified interval."),
    f("rad", &[V], Some(0), V, "Converts degrees to radians."),
    f("rate", &[M], Some(0), V, "Per-second average rate of increase of the time series in the range vector."),
    f("resets", &[M], Some(0), V, "Number of counter resets within the range."),
    f("round", &[V, S], Some(1), V, "Rounds sample values to the nearest multiple of an optional argument."),
    f("scalar", &[V], Some(0), S, "Sample value of a single-element vector as a scalar."),
    f("sgn", &[V], Some(0), V, "Sign of all sample values."),
    f("sin", &[V], Some(0), V, "Sine of all sample values."),
    f("sinh", &[V], Some(0), V, "Hyperbolic sine of all sample values."),
    f("sort", &[V], Some(0), V, "Sorts vector elements by sample value, ascending."),
    f("sort_by_label", &[V, Str], None, V, "Sorts vector elements by the given labels, ascending."),
    f("sort_by_label_desc", &[V, Str], None, V, "Sorts vector elements by the given labels, descending."),
    f("sort_desc", &[V], Some(0), V, "Sorts vector elements by sample value, descending."),
    f("sqrt", &[V], Some(0), V, "Square root of all sample values."),
    f("stddev_over_time", &[M], Some(0), V, "Population standard deviation of the values in the specified interval."),
    f("stdvar_over_time", &[M], Some(0), V, "Population standard variance of the values in the specified interval."),
    f("sum_over_time", &[M], Some(0), V, "Sum of all values in the specified interval."),
    f("tan", &[V], Some(0), V, "Tangent of all sample values."),
    f("tanh", &[V], Some(0), V, "Hyperbolic tangent of all sample values."),
    f("time", &[], Some(0), S, "Seconds since January 1, 1970 UTC at evaluation time."),
    f("timestamp", &[V], Some(0), V, "Timestamp of each sample as seconds since January 1, 1970 UTC."),
    f("vector", &[S], Some(0), V, "Returns the scalar as a vector with no labels."),
    f("year", &[V], Some(1), V, "Year for each timestamp in UTC."),
];

/// Look up a built-in function by exact name.
pub fn function(name: &str) -> Option<&'static Function> {
    FUNCTIONS
        .binary_search_by(|func| func.name.cmp(name))
        .ok()
        .map(|idx| &FUNCTIONS[idx])
}

/// One-line description of an aggregation operator.
pub const fn aggregation_doc(op: AggregateOp) -> &'static str {
    match op {
        AggregateOp::Sum => "Calculates the sum over dimensions.",
        AggregateOp::Avg => "Calculates the average over dimensions.",
        AggregateOp::Count => "Counts the number of elements in the vector.",
        AggregateOp::Min => "Selects the minimum over dimensions.",
        AggregateOp::Max => "Selects the maximum over dimensions.",
        AggregateOp::Group => "All values in the resulting vector are 1.",
        AggregateOp::Stddev => "Calculates the population standard deviation over dimensions.",
        AggregateOp::Stdvar => "Calculates the population standard variance over dimensions.",
        AggregateOp::Topk => "Largest k elements by sample value.",
        AggregateOp::Bottomk => "Smallest k elements by sample value.",
        AggregateOp::CountValues => "Counts the number of elements with the same value.",
        AggregateOp::Quantile => "Calculates the φ-quantile (0 ≤ φ ≤ 1) over dimensions.",
        AggregateOp::Limitk => "Samples k elements.",
        AggregateOp::LimitRatio => "Samples elements with approximately the given ratio.",
    }
}

/// Keywords that may appear between expressions.
pub const KEYWORDS: &[&str] = &[
    "and",
    "atan2",
    "bool",
    "by",
    "group_left",
    "group_right",
    "ignoring",
    "offset",
    "on",
    "or",
    "unless",
    "without",
];

/// Whether `ident` is a reserved keyword or aggregation name.
pub fn is_reserved(ident: &str) -> bool {
    KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(ident))
        || AggregateOp::from_name(ident).is_some()
}
