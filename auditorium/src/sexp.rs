use crate::*;

use std::fmt;

/// A parenthesized, ordered, typed term: `term := atom | (term*)`.
///
/// Every signed or logged payload is one of these. Signing and hashing
/// operate over the canonical byte encoding, so re-serializing
/// semantically-equal data differently is never treated as equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sexp {
    Atom(String),
    Bytes(#[serde(with = "hex_serde")] Vec<u8>),
    List(Vec<Sexp>),
}

impl Sexp {
    pub fn atom(s: impl Into<String>) -> Self {
        Sexp::Atom(s.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Sexp::Bytes(b.into())
    }

    pub fn list(items: Vec<Sexp>) -> Self {
        Sexp::List(items)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Sexp::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Sexp::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexp]> {
        match self {
            Sexp::List(items) => Some(items),
            _ => None,
        }
    }

    /// The one canonical serialization of this term.
    ///
    /// String atoms encode as `len:utf8`, byte atoms as `#len:raw`, lists
    /// as `(` item* `)`. There is exactly one encoding per value.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Sexp::Atom(s) => {
                out.extend_from_slice(s.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(s.as_bytes());
            }
            Sexp::Bytes(b) => {
                out.push(b'#');
                out.extend_from_slice(b.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(b);
            }
            Sexp::List(items) => {
                out.push(b'(');
                for item in items {
                    item.write_canonical(out);
                }
                out.push(b')');
            }
        }
    }

    /// Parse a canonical encoding back into a term.
    ///
    /// Trailing bytes after the top-level term are rejected.
    pub fn parse(input: &[u8]) -> Result<Sexp, Error> {
        let mut cursor = Cursor { input, pos: 0 };
        let sexp = cursor.parse_term()?;
        if cursor.pos != input.len() {
            return Err(Error::MalformedSexp("trailing bytes after term"));
        }
        Ok(sexp)
    }
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Result<u8, Error> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or(Error::MalformedSexp("unexpected end of input"))
    }

    fn parse_term(&mut self) -> Result<Sexp, Error> {
        match self.peek()? {
            b'(' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b')' {
                    items.push(self.parse_term()?);
                }
                self.pos += 1;
                Ok(Sexp::List(items))
            }
            b'#' => {
                self.pos += 1;
                let raw = self.parse_netstring()?;
                Ok(Sexp::Bytes(raw.to_vec()))
            }
            b'0'..=b'9' => {
                let raw = self.parse_netstring()?;
                let s = std::str::from_utf8(raw)
                    .map_err(|_| Error::MalformedSexp("atom is not valid UTF-8"))?;
                Ok(Sexp::Atom(s.to_string()))
            }
            _ => Err(Error::MalformedSexp("expected atom or list")),
        }
    }

    fn parse_netstring(&mut self) -> Result<&'a [u8], Error> {
        let start = self.pos;
        while self.peek()?.is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::MalformedSexp("missing length prefix"));
        }
        if self.peek()? != b':' {
            return Err(Error::MalformedSexp("missing `:` after length prefix"));
        }
        let len: usize = std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(Error::MalformedSexp("bad length prefix"))?;
        self.pos += 1;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or(Error::MalformedSexp("length prefix past end of input"))?;
        let raw = &self.input[self.pos..end];
        self.pos = end;
        Ok(raw)
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Sexp::Atom(s) => {
                let bare = !s.is_empty()
                    && s.bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b"-_.".contains(&b));
                if bare {
                    write!(f, "{}", s)
                } else {
                    write!(f, "{:?}", s)
                }
            }
            Sexp::Bytes(b) => write!(f, "#{}#", hex::encode(b)),
            Sexp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
