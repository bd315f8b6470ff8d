//! Raw-value validation for the schema model
//!
//! Walks an untyped `serde_json::Value` against a target shape, collecting every
//! rule violation with the field path where it occurred. Validation never panics
//! and never stops at the first problem: the caller receives either the typed
//! value or the complete list of violations.

use serde_json::{Map, Value};
use std::fmt;

/// What went wrong at a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Required field is absent
    Missing { expected: &'static str },
    /// Field is present but has the wrong JSON type
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    /// Literal is outside a closed enumeration
    NotInEnum {
        found: String,
        allowed: &'static [&'static str],
    },
    /// Number has the right type but an unacceptable value
    OutOfRange {
        found: String,
        expected: &'static str,
    },
}

/// A single rule violation, located by field path (e.g. `instrumentation[2].status`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "<root>"
        } else {
            self.path.as_str()
        };
        match &self.kind {
            ViolationKind::Missing { expected } => {
                write!(f, "{}: missing required field (expected {})", path, expected)
            }
            ViolationKind::WrongType { expected, found } => {
                write!(f, "{}: expected {}, found {}", path, expected, found)
            }
            ViolationKind::NotInEnum { found, allowed } => write!(
                f,
                "{}: '{}' is not one of [{}]",
                path,
                found,
                allowed.join(", ")
            ),
            ViolationKind::OutOfRange { found, expected } => {
                write!(f, "{}: {} is out of range (expected {})", path, found, expected)
            }
        }
    }
}

/// Raw value does not conform to the target shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    shape: &'static str,
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Name of the shape that was being validated ("Plan", "Track", ...)
    pub fn shape(&self) -> &'static str {
        self.shape
    }

    /// Every violation found, in document order
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Field paths of all violations
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed validation with {} violation(s): ",
            self.shape,
            self.violations.len()
        )?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Closed enumeration serialized as a lowercase literal
pub trait SchemaEnum: Sized + Copy {
    /// Every accepted literal
    const ALLOWED: &'static [&'static str];

    fn from_literal(literal: &str) -> Option<Self>;
}

/// A type that can be read out of a raw structural value
pub trait Schema: Sized {
    /// Shape name used in error messages
    const SHAPE: &'static str;

    /// Read `value` into `Self`, reporting violations to `walker`.
    ///
    /// Returns `None` only after at least one violation has been reported.
    fn read(walker: &mut FieldWalker, value: &Value) -> Option<Self>;
}

/// Validate a raw structural value against the shape of `T`
pub fn validate<T: Schema>(value: &Value) -> Result<T, ValidationError> {
    let mut walker = FieldWalker::default();
    let typed = T::read(&mut walker, value);

    match typed {
        Some(typed) if walker.violations.is_empty() => Ok(typed),
        _ => Err(ValidationError {
            shape: T::SHAPE,
            violations: walker.violations,
        }),
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Field(&'static str),
    Index(usize),
}

/// Field path tracker and violation accumulator
#[derive(Debug, Default)]
pub struct FieldWalker {
    path: Vec<Segment>,
    violations: Vec<Violation>,
}

impl FieldWalker {
    fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                Segment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Segment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    fn report(&mut self, kind: ViolationKind) {
        let path = self.path_string();
        self.violations.push(Violation { path, kind });
    }

    fn at<T>(&mut self, segment: Segment, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        out
    }

    /// Require `value` to be a JSON object
    pub fn object<'v>(&mut self, value: &'v Value) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.report(ViolationKind::WrongType {
                    expected: "object",
                    found: type_name(other),
                });
                None
            }
        }
    }

    /// Look up a required field, reporting it missing when absent
    fn required<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        name: &'static str,
        expected: &'static str,
    ) -> Option<&'v Value> {
        let value = obj.get(name);
        if value.is_none() {
            self.at(Segment::Field(name), |w| {
                w.report(ViolationKind::Missing { expected })
            });
        }
        value
    }

    /// Required text field
    pub fn string(&mut self, obj: &Map<String, Value>, name: &'static str) -> Option<String> {
        let value = self.required(obj, name, "string")?;
        self.at(Segment::Field(name), |w| w.as_string(value))
    }

    fn as_string(&mut self, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            other => {
                self.report(ViolationKind::WrongType {
                    expected: "string",
                    found: type_name(other),
                });
                None
            }
        }
    }

    /// Required list of text values
    pub fn string_list(
        &mut self,
        obj: &Map<String, Value>,
        name: &'static str,
    ) -> Option<Vec<String>> {
        self.list(obj, name, "array of strings", |w, item| w.as_string(item))
    }

    /// Required integer that must be strictly positive
    pub fn positive_int(&mut self, obj: &Map<String, Value>, name: &'static str) -> Option<u32> {
        let value = self.required(obj, name, "positive integer")?;
        self.at(Segment::Field(name), |w| {
            let n = w.as_integer(value, "positive integer")?;
            match u32::try_from(n) {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    w.report(ViolationKind::OutOfRange {
                        found: n.to_string(),
                        expected: "positive integer",
                    });
                    None
                }
            }
        })
    }

    /// Required General-MIDI program number (0..=127)
    pub fn midi_program(&mut self, obj: &Map<String, Value>, name: &'static str) -> Option<u8> {
        let value = self.required(obj, name, "integer 0..=127")?;
        self.at(Segment::Field(name), |w| {
            let n = w.as_integer(value, "integer 0..=127")?;
            match u8::try_from(n) {
                Ok(n) if n <= 127 => Some(n),
                _ => {
                    w.report(ViolationKind::OutOfRange {
                        found: n.to_string(),
                        expected: "integer 0..=127",
                    });
                    None
                }
            }
        })
    }

    fn as_integer(&mut self, value: &Value, expected: &'static str) -> Option<i64> {
        let n = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            }),
            _ => None,
        };
        if n.is_none() {
            let found = match value {
                Value::Number(_) => "non-integral number",
                other => type_name(other),
            };
            self.report(ViolationKind::WrongType { expected, found });
        }
        n
    }

    /// Optional boolean; absent and `null` both read as `None`
    pub fn optional_bool(
        &mut self,
        obj: &Map<String, Value>,
        name: &'static str,
    ) -> Option<Option<bool>> {
        match obj.get(name) {
            None | Some(Value::Null) => Some(None),
            Some(Value::Bool(b)) => Some(Some(*b)),
            Some(other) => {
                self.at(Segment::Field(name), |w| {
                    w.report(ViolationKind::WrongType {
                        expected: "boolean",
                        found: type_name(other),
                    })
                });
                None
            }
        }
    }

    /// Required closed-enumeration literal
    pub fn enumerated<E: SchemaEnum>(
        &mut self,
        obj: &Map<String, Value>,
        name: &'static str,
    ) -> Option<E> {
        let value = self.required(obj, name, "enum literal")?;
        self.at(Segment::Field(name), |w| w.as_enum(value))
    }

    /// Optional closed-enumeration literal; absent and `null` yield `default`
    pub fn enumerated_or<E: SchemaEnum>(
        &mut self,
        obj: &Map<String, Value>,
        name: &'static str,
        default: E,
    ) -> Option<E> {
        match obj.get(name) {
            None | Some(Value::Null) => Some(default),
            Some(value) => self.at(Segment::Field(name), |w| w.as_enum(value)),
        }
    }

    fn as_enum<E: SchemaEnum>(&mut self, value: &Value) -> Option<E> {
        let literal = self.as_string(value)?;
        let parsed = E::from_literal(&literal);
        if parsed.is_none() {
            self.report(ViolationKind::NotInEnum {
                found: literal,
                allowed: E::ALLOWED,
            });
        }
        parsed
    }

    /// Required nested object of shape `T`
    pub fn nested<T: Schema>(&mut self, obj: &Map<String, Value>, name: &'static str) -> Option<T> {
        let value = self.required(obj, name, T::SHAPE)?;
        self.at(Segment::Field(name), |w| T::read(w, value))
    }

    /// Required array of shape `T`
    pub fn nested_list<T: Schema>(
        &mut self,
        obj: &Map<String, Value>,
        name: &'static str,
    ) -> Option<Vec<T>> {
        self.list(obj, name, "array", |w, item| T::read(w, item))
    }

    fn list<T>(
        &mut self,
        obj: &Map<String, Value>,
        name: &'static str,
        expected: &'static str,
        mut each: impl FnMut(&mut Self, &Value) -> Option<T>,
    ) -> Option<Vec<T>> {
        let value = self.required(obj, name, expected)?;
        self.at(Segment::Field(name), |w| {
            let Value::Array(items) = value else {
                w.report(ViolationKind::WrongType {
                    expected,
                    found: type_name(value),
                });
                return None;
            };

            // Keep walking after a bad element so every violation is reported
            let mut out = Vec::with_capacity(items.len());
            let mut complete = true;
            for (i, item) in items.iter().enumerate() {
                match w.at(Segment::Index(i), |w| each(w, item)) {
                    Some(parsed) => out.push(parsed),
                    None => complete = false,
                }
            }
            complete.then_some(out)
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
