//! Cache key generation.
//!
//! Keys have the shape `<namespace>:<param>:<param>...`. Every character of a
//! parameter outside `[A-Za-z0-9]` becomes `_`, which makes the mapping lossy:
//! `"a.b"` and `"a_b"` produce the same key.

use super::cache_model::Namespace;

/// One positional key parameter: a string, a number, or absent.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyParam {
    Text(String),
    Int(i64),
    Float(f64),
    Absent,
}

impl KeyParam {
    fn render(&self) -> Option<String> {
        match self {
            KeyParam::Text(s) => Some(s.clone()),
            KeyParam::Int(i) => Some(i.to_string()),
            KeyParam::Float(f) => Some(render_number(*f)),
            KeyParam::Absent => None,
        }
    }
}

/// Formats a float the way a JavaScript `String(number)` call does, so keys
/// match those produced by the dashboard: whole values drop the fraction,
/// magnitudes from `1e21` up or below `1e-6` use exponent notation with an
/// explicit sign, and non-finite values spell out `NaN` / `Infinity`.
fn render_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        if let Some((mantissa, exponent)) = formatted.split_once('e') {
            return if exponent.starts_with('-') {
                format!("{}e{}", mantissa, exponent)
            } else {
                format!("{}e+{}", mantissa, exponent)
            };
        }
        return formatted;
    }

    value.to_string()
}

impl From<&str> for KeyParam {
    fn from(value: &str) -> Self {
        KeyParam::Text(value.to_string())
    }
}

impl From<String> for KeyParam {
    fn from(value: String) -> Self {
        KeyParam::Text(value)
    }
}

impl From<&String> for KeyParam {
    fn from(value: &String) -> Self {
        KeyParam::Text(value.clone())
    }
}

impl From<f64> for KeyParam {
    fn from(value: f64) -> Self {
        KeyParam::Float(value)
    }
}

macro_rules! impl_int_key_param {
    ($($t:ty),*) => {
        $(
            impl From<$t> for KeyParam {
                fn from(value: $t) -> Self {
                    KeyParam::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_int_key_param!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for KeyParam {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(KeyParam::Int)
            .unwrap_or(KeyParam::Float(value as f64))
    }
}

impl From<usize> for KeyParam {
    fn from(value: usize) -> Self {
        KeyParam::from(value as u64)
    }
}

impl From<isize> for KeyParam {
    fn from(value: isize) -> Self {
        KeyParam::Int(value as i64)
    }
}

impl<T: Into<KeyParam>> From<Option<T>> for KeyParam {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(KeyParam::Absent)
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Builds a deterministic cache key from a namespace and positional params.
///
/// Absent params are skipped entirely, so `[Some("X"), None]` and `["X"]`
/// produce the same key.
pub fn generate_key<I, P>(namespace: Namespace, params: I) -> String
where
    I: IntoIterator<Item = P>,
    P: Into<KeyParam>,
{
    let sanitized: Vec<String> = params
        .into_iter()
        .filter_map(|p| p.into().render())
        .map(|p| sanitize(&p))
        .collect();

    format!("{}:{}", namespace.as_str(), sanitized.join(":"))
}

/// Builds a cache key from params of mixed types.
///
/// ```
/// use fin_data_lab_core::cache::Namespace;
/// use fin_data_lab_core::cache_key;
///
/// let start: Option<&str> = None;
/// let key = cache_key!(Namespace::FundHistory, "12.345.678/0001-90", start);
/// assert_eq!(key, "fundHistory:12_345_678_0001_90");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($namespace:expr $(, $param:expr)* $(,)?) => {{
        let params: ::std::vec::Vec<$crate::cache::KeyParam> =
            ::std::vec![$($crate::cache::KeyParam::from($param)),*];
        $crate::cache::generate_key($namespace, params)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fund_detail_key_is_sanitized() {
        let key = generate_key(Namespace::FundDetail, ["41.776.752/0001-26"]);
        assert_eq!(key, "fundDetail:41_776_752_0001_26");
    }

    #[test]
    fn test_absent_params_are_dropped() {
        let with_absent = cache_key!(Namespace::FundHistory, "X", None::<&str>);
        let without = cache_key!(Namespace::FundHistory, "X");
        assert_eq!(with_absent, without);
        assert_eq!(without, "fundHistory:X");
    }

    #[test]
    fn test_mixed_params_render_like_strings() {
        let key = cache_key!(Namespace::AllocatorFlow, "Itau Unibanco", "all", "all", 12);
        assert_eq!(key, "allocatorFlow:Itau_Unibanco:all:all:12");

        let key = cache_key!(Namespace::FundSearch, "kinea", 1.5, 50.0);
        assert_eq!(key, "fundSearch:kinea:1_5:50");
    }

    #[test]
    fn test_floats_render_like_javascript_numbers() {
        assert_eq!(render_number(1e21), "1e+21");
        assert_eq!(render_number(1e20), "100000000000000000000");
        assert_eq!(render_number(1e-7), "1e-7");
        assert_eq!(render_number(1.5e-7), "1.5e-7");
        assert_eq!(render_number(0.000001), "0.000001");
        assert_eq!(render_number(-0.0), "0");
        assert_eq!(render_number(f64::INFINITY), "Infinity");
        assert_eq!(render_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(render_number(f64::NAN), "NaN");

        let key = cache_key!(Namespace::FundSearch, 1e21, 1e-7, f64::INFINITY);
        assert_eq!(key, "fundSearch:1e_21:1e_7:Infinity");
    }

    #[test]
    fn test_unsigned_and_pointer_sized_params() {
        let page: usize = 3;
        let offset: u64 = 40;
        assert_eq!(cache_key!(Namespace::FundSearch, "kinea", page, offset), "fundSearch:kinea:3:40");
        assert_eq!(KeyParam::from(u64::MAX), KeyParam::Float(u64::MAX as f64));
    }

    #[test]
    fn test_namespace_without_params_keeps_separator() {
        assert_eq!(cache_key!(Namespace::AllocatorFilters), "allocatorFilters:");
    }

    #[test]
    fn test_sanitization_is_lossy() {
        assert_eq!(
            generate_key(Namespace::FundSearch, ["a.b"]),
            generate_key(Namespace::FundSearch, ["a_b"])
        );
    }

    proptest! {
        #[test]
        fn prop_key_is_deterministic(params in proptest::collection::vec(".*", 0..5)) {
            let first = generate_key(Namespace::FundDetail, params.iter());
            let second = generate_key(Namespace::FundDetail, params.iter());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_params_only_contain_safe_chars(params in proptest::collection::vec(".*", 1..5)) {
            let key = generate_key(Namespace::FundSearch, params.iter());
            let (_, rest) = key.split_once(':').unwrap();
            prop_assert!(rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':'));
            prop_assert_eq!(rest.split(':').count(), params.len());
        }
    }
}
