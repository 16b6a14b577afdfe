use std::fmt;

/// Numeric value. `scale` keeps the fractional digits a literal was written
/// with so that `2.50` prints back as `2.50`; computed numbers have none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Number {
    pub value: f64,
    pub scale: Option<u8>,
}

impl Number {
    pub fn new(value: f64) -> Self {
        Self { value, scale: None }
    }

    pub fn with_scale(value: f64, scale: u8) -> Self {
        Self {
            value,
            scale: Some(scale),
        }
    }

    /// Same scale, new magnitude.
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        Self {
            value: f(self.value),
            scale: self.scale,
        }
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -0 folds to 0 in both forms.
        let value = if self.value == 0.0 { 0.0 } else { self.value };
        match self.scale {
            Some(scale) if value.is_finite() => {
                write!(f, "{value:.precision$}", precision = usize::from(scale))
            }
            // `f64`'s Display already drops the fraction of integral values.
            _ => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Number),
    Boolean(bool),
    String(String),
}

impl Value {
    pub fn number(value: f64) -> Self {
        Value::Number(Number::new(value))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            Value::Number(_) | Value::String(_) => None,
        }
    }

    /// Canonical printed form shared by every backend.
    pub fn to_output(&self) -> String {
        match self {
            Value::Number(number) => number.to_string(),
            Value::Boolean(value) => value.to_string(),
            Value::String(value) => value.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_print_without_fraction() {
        assert_eq!(Value::number(14.0).to_output(), "14");
        assert_eq!(Value::number(-3.0).to_output(), "-3");
        assert_eq!(Value::number(-0.0).to_output(), "0");
        assert_eq!(Value::number(1e20).to_output(), "100000000000000000000");
    }

    #[test]
    fn fractional_numbers_use_shortest_form() {
        assert_eq!(Value::number(2.5).to_output(), "2.5");
        assert_eq!(Value::number(0.1 + 0.2).to_output(), "0.30000000000000004");
    }

    #[test]
    fn literal_scale_keeps_written_digits() {
        assert_eq!(Number::with_scale(2.5, 2).to_string(), "2.50");
        assert_eq!(Number::with_scale(1.0, 1).to_string(), "1.0");
        assert_eq!(Number::with_scale(-0.0, 1).to_string(), "0.0");
        assert_eq!(Number::with_scale(3.25, 2).map(|v| -v).to_string(), "-3.25");
    }

    #[test]
    fn booleans_and_strings() {
        assert_eq!(Value::Boolean(true).to_output(), "true");
        assert_eq!(Value::String("a b".to_string()).to_string(), "a b");
        assert_eq!(Value::String(String::new()).type_name(), "string");
    }
}
