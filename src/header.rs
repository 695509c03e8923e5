//! The numpy-style array header embedded in self-describing descriptors.
//!
//! The header is the textual serialization of a Python mapping with exactly
//! the keys `descr`, `fortran_order` and `shape`, e.g.
//!
//! ```text
//! {'descr': '>u2', 'fortran_order': False, 'shape': (2, 3)}
//! ```
//!
//! Parsing accepts the literal subset that appears in such headers
//! (strings, booleans, integers, tuples and lists); anything else is a
//! descriptor error quoting the offending text.

use crate::array::ArrayOrder;
use crate::data_type::{DType, Endianness};
use crate::error::{SpeadError, SpeadResult};

/// The contents of a parsed array header.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedHeader {
    pub shape: Vec<i64>,
    pub order: ArrayOrder,
    pub dtype: DType,
}

/// Emit the canonical header form for a dtype-bearing descriptor.
pub(crate) fn make_header(shape: &[i64], dtype: &DType, order: ArrayOrder) -> String {
    format!(
        "{{'descr': {}, 'fortran_order': {}, 'shape': {}}}",
        dtype.descr(),
        if order == ArrayOrder::F { "True" } else { "False" },
        format_shape(shape)
    )
}

fn format_shape(shape: &[i64]) -> String {
    match shape {
        [] => "()".to_owned(),
        [dim] => format!("({dim},)"),
        dims => {
            let entries: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", entries.join(", "))
        }
    }
}

/// Parse and validate a header string.
pub(crate) fn parse_header(header: &str) -> SpeadResult<ParsedHeader> {
    let literal = Parser::new(header).parse()?;
    let entries = match literal {
        Literal::Dict(entries) => entries,
        other => {
            return Err(SpeadError::DescriptorParse(format!(
                "descriptor is not a dictionary: {other:?}"
            )))
        }
    };

    let mut keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
    keys.sort_unstable();
    if keys != ["descr", "fortran_order", "shape"] {
        return Err(SpeadError::DescriptorParse(format!(
            "descriptor does not contain the correct keys: {keys:?}"
        )));
    }

    let lookup = |name: &str| {
        entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    };

    let shape = match lookup("shape") {
        Some(Literal::Tuple(dims)) => {
            let mut shape = Vec::with_capacity(dims.len());
            for dim in dims {
                match dim {
                    Literal::Int(value) => shape.push(*value),
                    other => {
                        return Err(SpeadError::DescriptorParse(format!(
                            "shape is not valid: {other:?}"
                        )))
                    }
                }
            }
            shape
        }
        other => {
            return Err(SpeadError::DescriptorParse(format!(
                "shape is not valid: {other:?}"
            )))
        }
    };

    let order = match lookup("fortran_order") {
        Some(Literal::Bool(true)) => ArrayOrder::F,
        Some(Literal::Bool(false)) => ArrayOrder::C,
        other => {
            return Err(SpeadError::DescriptorParse(format!(
                "fortran_order is not a valid bool: {other:?}"
            )))
        }
    };

    let dtype = match lookup("descr") {
        Some(Literal::Str(descr)) => DType::parse_scalar_descr(descr)?,
        Some(Literal::List(fields)) => parse_compound_descr(fields)?,
        other => {
            return Err(SpeadError::DescriptorParse(format!(
                "descr is not a valid dtype descriptor: {other:?}"
            )))
        }
    };

    Ok(ParsedHeader {
        shape,
        order,
        dtype,
    })
}

/// A compound descr is a list of `('name', 'descr')` pairs. All multi-byte
/// fields must agree on byte order.
fn parse_compound_descr(fields: &[Literal]) -> SpeadResult<DType> {
    let invalid = || {
        SpeadError::DescriptorParse(format!(
            "descr is not a valid dtype descriptor: {fields:?}"
        ))
    };
    if fields.is_empty() {
        return Err(invalid());
    }
    let mut data_types = Vec::with_capacity(fields.len());
    let mut byte_order: Option<Endianness> = None;
    for field in fields {
        let Literal::Tuple(pair) = field else {
            return Err(invalid());
        };
        let [Literal::Str(_), Literal::Str(descr)] = &pair[..] else {
            return Err(invalid());
        };
        let parsed = DType::parse_scalar_descr(descr)?;
        let data_type = parsed.scalar_type().ok_or_else(invalid)?;
        if data_type.size() > 1 {
            match byte_order {
                None => byte_order = Some(parsed.byte_order()),
                Some(order) if order == parsed.byte_order() => {}
                Some(_) => return Err(invalid()),
            }
        }
        data_types.push(data_type);
    }
    Ok(DType::compound(
        data_types,
        byte_order.unwrap_or_else(Endianness::native),
    ))
}

/// The Python literal subset found in array headers.
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Bool(bool),
    Int(i64),
    Tuple(Vec<Literal>),
    List(Vec<Literal>),
    Dict(Vec<(String, Literal)>),
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self) -> SpeadError {
        SpeadError::DescriptorParse(format!("cannot parse descriptor: {:?}", self.src))
    }

    fn parse(mut self) -> SpeadResult<Literal> {
        let value = self.value()?;
        self.skip_whitespace();
        if self.pos != self.bytes.len() {
            return Err(self.error());
        }
        Ok(value)
    }

    fn skip_whitespace(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> SpeadResult<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn value(&mut self) -> SpeadResult<Literal> {
        match self.peek().ok_or_else(|| self.error())? {
            b'\'' | b'"' => self.string(),
            b'(' => self.sequence(b'(', b')').map(Literal::Tuple),
            b'[' => self.sequence(b'[', b']').map(Literal::List),
            b'{' => self.dict(),
            b'T' | b'F' => self.boolean(),
            b'-' | b'0'..=b'9' => self.integer(),
            _ => Err(self.error()),
        }
    }

    fn string(&mut self) -> SpeadResult<Literal> {
        let quote = match self.peek() {
            Some(quote @ (b'\'' | b'"')) => quote,
            _ => return Err(self.error()),
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == quote {
                let text = self.src[start..self.pos].to_owned();
                self.pos += 1;
                return Ok(Literal::Str(text));
            }
            self.pos += 1;
        }
        Err(self.error())
    }

    fn boolean(&mut self) -> SpeadResult<Literal> {
        for (word, value) in [("True", true), ("False", false)] {
            if self.src[self.pos..].starts_with(word) {
                self.pos += word.len();
                return Ok(Literal::Bool(value));
            }
        }
        Err(self.error())
    }

    fn integer(&mut self) -> SpeadResult<Literal> {
        let start = self.pos;
        if self.bytes.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_digit())
        {
            self.pos += 1;
        }
        self.src[start..self.pos]
            .parse()
            .map(Literal::Int)
            .map_err(|_| self.error())
    }

    fn sequence(&mut self, open: u8, close: u8) -> SpeadResult<Vec<Literal>> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {}
                _ => return Err(self.error()),
            }
        }
    }

    fn dict(&mut self) -> SpeadResult<Literal> {
        self.expect(b'{')?;
        let mut entries = Vec::new();
        loop {
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Literal::Dict(entries));
            }
            let key = match self.string()? {
                Literal::Str(key) => key,
                _ => return Err(self.error()),
            };
            self.expect(b':')?;
            let value = self.value()?;
            entries.push((key, value));
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error()),
            }
        }
    }
}
