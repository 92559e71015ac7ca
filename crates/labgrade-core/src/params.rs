//! Operator dictionary text: `{'retries': 2, 'exam_mode': True}`.
//!
//! A restricted literal grammar replaces any kind of expression evaluation.
//! Keys are quoted strings or bare identifiers; values are booleans
//! (`True`/`False`/`true`/`false`) or numbers. JSON objects with such
//! values are accepted as-is. An empty or blank input is an empty map.

use crate::anomaly::ReferenceConfig;
use crate::error::ParamsError;
use crate::model::{ParamMap, ParamValue};
use crate::scores::{Bareme, WeightMatrix};

/// Parse dictionary text into a parameter map.
pub fn parse_literal_map(text: &str) -> Result<ParamMap, ParamsError> {
    let mut parser = LiteralParser::new(text);
    parser.skip_ws();
    if parser.at_end() {
        return Ok(ParamMap::new());
    }
    let map = parser.parse_map()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(ParamsError::TrailingInput {
            position: parser.pos,
        });
    }
    Ok(map)
}

/// Parse monitored parameters into a reference configuration.
pub fn parse_reference(text: &str) -> Result<ReferenceConfig, ParamsError> {
    Ok(ReferenceConfig::new(parse_literal_map(text)?))
}

/// Parse a weight matrix. All four outcomes are required.
pub fn parse_weights(text: &str) -> Result<WeightMatrix, ParamsError> {
    let map = parse_literal_map(text)?;
    let mut slots: [Option<f64>; 4] = [None; 4];

    for (key, value) in &map {
        let index = match key.to_uppercase().as_str() {
            "TT" | "TP" => 0,
            "TF" | "FP" => 1,
            "FT" | "FN" => 2,
            "FF" | "TN" => 3,
            _ => return Err(ParamsError::UnknownWeightKey(key.clone())),
        };
        if slots[index].is_some() {
            return Err(ParamsError::DuplicateKey(key.clone()));
        }
        slots[index] = Some(number(key, value)?);
    }

    let [tt, tf, ft, ff] = slots;
    Ok(WeightMatrix {
        true_true: tt.ok_or(ParamsError::MissingWeight("TT"))?,
        true_false: tf.ok_or(ParamsError::MissingWeight("TF"))?,
        false_true: ft.ok_or(ParamsError::MissingWeight("FT"))?,
        false_false: ff.ok_or(ParamsError::MissingWeight("FF"))?,
    })
}

/// Parse a bareme: question id → non-negative coefficient.
pub fn parse_bareme(text: &str) -> Result<Bareme, ParamsError> {
    parse_literal_map(text)?
        .iter()
        .map(|(key, value)| {
            let coefficient = number(key, value)?;
            if coefficient < 0.0 {
                return Err(ParamsError::NegativeCoefficient {
                    key: key.clone(),
                    value: coefficient,
                });
            }
            Ok((key.clone(), coefficient))
        })
        .collect()
}

/// A parsed value, or its fallback together with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Lenient<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T: Default> Lenient<T> {
    fn from_result(result: Result<T, ParamsError>, what: &str) -> Self {
        match result {
            Ok(value) => Self {
                value,
                warning: None,
            },
            Err(e) => {
                let warning = format!("invalid {what} ({e}), falling back to an empty mapping");
                tracing::warn!("{warning}");
                Self {
                    value: T::default(),
                    warning: Some(warning),
                }
            }
        }
    }
}

/// Monitored parameters, falling back to an empty reference.
pub fn parse_reference_lenient(text: &str) -> Lenient<ReferenceConfig> {
    Lenient::from_result(parse_reference(text), "monitored parameters")
}

/// Bareme, falling back to an empty scale (every coefficient 1.0).
pub fn parse_bareme_lenient(text: &str) -> Lenient<Bareme> {
    Lenient::from_result(parse_bareme(text), "bareme")
}

fn number(key: &str, value: &ParamValue) -> Result<f64, ParamsError> {
    match value {
        ParamValue::Number(n) => Ok(*n),
        _ => Err(ParamsError::NotANumber {
            key: key.to_string(),
        }),
    }
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: char, expected: &'static str) -> Result<(), ParamsError> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(ParamsError::UnexpectedChar {
                found,
                position: self.pos,
                expected,
            }),
            None => Err(ParamsError::UnexpectedEnd { expected }),
        }
    }

    fn parse_map(&mut self) -> Result<ParamMap, ParamsError> {
        self.expect('{', "'{'")?;
        let mut map = ParamMap::new();

        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(map);
            }

            let key = self.parse_key()?;
            self.skip_ws();
            self.expect(':', "':'")?;
            self.skip_ws();
            let value = self.parse_value(&key)?;
            if map.insert(key.clone(), value).is_some() {
                return Err(ParamsError::DuplicateKey(key));
            }

            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(map);
                }
                Some(found) => {
                    return Err(ParamsError::UnexpectedChar {
                        found,
                        position: self.pos,
                        expected: "',' or '}'",
                    })
                }
                None => {
                    return Err(ParamsError::UnexpectedEnd {
                        expected: "',' or '}'",
                    })
                }
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, ParamsError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == quote {
                        let key: String = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return Ok(key);
                    }
                    self.pos += 1;
                }
                Err(ParamsError::UnexpectedEnd {
                    expected: "closing quote",
                })
            }
            Some(c) if c.is_alphabetic() || c == '_' => Ok(self.take_word()),
            Some(found) => Err(ParamsError::UnexpectedChar {
                found,
                position: self.pos,
                expected: "a key",
            }),
            None => Err(ParamsError::UnexpectedEnd { expected: "a key" }),
        }
    }

    fn take_word(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_value(&mut self, key: &str) -> Result<ParamValue, ParamsError> {
        match self.peek() {
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                self.parse_number().map(ParamValue::Number)
            }
            Some(c) if c.is_alphabetic() => match self.take_word().as_str() {
                "True" | "true" => Ok(ParamValue::Bool(true)),
                "False" | "false" => Ok(ParamValue::Bool(false)),
                _ => Err(ParamsError::UnsupportedValue {
                    key: key.to_string(),
                }),
            },
            Some(_) => Err(ParamsError::UnsupportedValue {
                key: key.to_string(),
            }),
            None => Err(ParamsError::UnexpectedEnd {
                expected: "a value",
            }),
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParamsError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(ParamsError::InvalidNumber { text }),
        }
    }
}
