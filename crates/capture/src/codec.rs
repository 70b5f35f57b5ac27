//! URL 안전 압축 코덱
//!
//! 에러 레코드 목록을 쿼리 값에 이스케이프 없이 넣을 수 있는 문자열로 바꿉니다.
//! 출력 알파벳은 `A-Z a-z 0-9 - _ . ~ ' ( ) ! *` 입니다.
//!
//! # 문법
//!
//! ```text
//! value   = "~" ( int | "'" chars | "(" [ list | map ] ")" )
//! int     = [ "-" ] digit+
//! list    = value+
//! map     = chars value *( "~" chars value )
//! chars   = [A-Za-z0-9-_.] | "!" (공백) | "*" HEX HEX (그 외 UTF-8 바이트)
//! ```
//!
//! 레코드는 한 글자 키를 쓰며 기본값인 필드는 생략합니다.
//!
//! | 키 | 필드 | 생략 조건 |
//! |----|------|-----------|
//! | `m` | message | 필수 |
//! | `f` | source | 없음 |
//! | `l` | line | 없음 |
//! | `c` | column | 없음 |
//! | `s` | stack | 없음 |
//! | `n` | count | 1 |
//! | `v` | via | app |
//! | `t` | type_name | 없음 |
//! | `d` | timestamp | 0 |
//!
//! 디코딩은 실패 시 닫힙니다. 문법 오류, 알 수 없는 키, 메시지 누락,
//! 잘못된 UTF-8, 남는 입력, 범위를 벗어난 숫자는 모두 [`CodecError`]입니다.

use std::fmt::Write as _;

use tidemark_core::error::CodecError;

use crate::errors::{ErrorRecord, ErrorVia};

/// 디코딩 입력 최대 길이 (바이트)
pub const MAX_INPUT_LEN: usize = 1 << 20;

const MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Int(i128),
    Str(String),
    List(Vec<Node>),
    Map(Vec<(String, Node)>),
}

// ─── 인코딩 ─────────────────────────────────────────────────────────

/// 에러 레코드 목록을 압축합니다.
pub fn compress(records: &[ErrorRecord]) -> String {
    let node = Node::List(records.iter().map(record_to_node).collect());
    let mut out = String::new();
    write_node(&node, &mut out);
    out
}

fn record_to_node(record: &ErrorRecord) -> Node {
    let mut fields = vec![("m".to_owned(), Node::Str(record.message.clone()))];
    let mut push = |key: &str, node: Option<Node>| {
        if let Some(node) = node {
            fields.push((key.to_owned(), node));
        }
    };

    push("f", record.source.clone().map(Node::Str));
    push("l", record.line.map(|l| Node::Int(i128::from(l))));
    push("c", record.column.map(|c| Node::Int(i128::from(c))));
    push("s", record.stack.clone().map(Node::Str));
    push(
        "n",
        (record.count != 1).then(|| Node::Int(i128::from(record.count))),
    );
    push(
        "v",
        (record.via != ErrorVia::App).then(|| Node::Int(i128::from(record.via.code()))),
    );
    push("t", record.type_name.clone().map(Node::Str));
    push(
        "d",
        (record.timestamp != 0).then(|| Node::Int(i128::from(record.timestamp))),
    );

    Node::Map(fields)
}

fn write_node(node: &Node, out: &mut String) {
    out.push('~');
    match node {
        Node::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Node::Str(s) => {
            out.push('\'');
            write_chars(s, out);
        }
        Node::List(items) => {
            out.push('(');
            for item in items {
                write_node(item, out);
            }
            out.push(')');
        }
        Node::Map(fields) => {
            out.push('(');
            for (idx, (key, value)) in fields.iter().enumerate() {
                if idx > 0 {
                    out.push('~');
                }
                write_chars(key, out);
                write_node(value, out);
            }
            out.push(')');
        }
    }
}

fn write_chars(s: &str, out: &mut String) {
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(char::from(b)),
            b' ' => out.push('!'),
            _ => {
                let _ = write!(out, "*{b:02X}");
            }
        }
    }
}

// ─── 디코딩 ─────────────────────────────────────────────────────────

/// 압축 문자열을 에러 레코드 목록으로 되돌립니다.
pub fn decompress(input: &str) -> Result<Vec<ErrorRecord>, CodecError> {
    if input.len() > MAX_INPUT_LEN {
        return Err(CodecError::TooLarge {
            size: input.len(),
            max: MAX_INPUT_LEN,
        });
    }

    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let node = parser.value(0)?;
    if parser.pos != parser.bytes.len() {
        return Err(parser.malformed("trailing input"));
    }

    match node {
        Node::List(items) => items.into_iter().map(node_to_record).collect(),
        _ => Err(CodecError::Malformed {
            offset: 0,
            reason: "top level must be a list".to_owned(),
        }),
    }
}

fn node_to_record(node: Node) -> Result<ErrorRecord, CodecError> {
    let Node::Map(fields) = node else {
        return Err(CodecError::Malformed {
            offset: 0,
            reason: "record must be a map".to_owned(),
        });
    };

    let mut message = None;
    let mut record = ErrorRecord::new(String::new());
    let mut seen: Vec<String> = Vec::with_capacity(fields.len());

    for (key, value) in fields {
        if seen.contains(&key) {
            return Err(CodecError::Malformed {
                offset: 0,
                reason: format!("duplicate key '{key}'"),
            });
        }
        match key.as_str() {
            "m" => message = Some(expect_str("message", value)?),
            "f" => record.source = Some(expect_str("source", value)?),
            "l" => record.line = Some(expect_u32("line", value)?),
            "c" => record.column = Some(expect_u32("column", value)?),
            "s" => record.stack = Some(expect_str("stack", value)?),
            "n" => {
                let count = expect_u32("count", value)?;
                if count == 0 {
                    return Err(CodecError::InvalidField {
                        field: "count",
                        reason: "must be at least 1".to_owned(),
                    });
                }
                record.count = count;
            }
            "v" => {
                let code = expect_int("via", value)?;
                record.via = i64::try_from(code)
                    .ok()
                    .and_then(ErrorVia::from_code)
                    .ok_or_else(|| CodecError::InvalidField {
                        field: "via",
                        reason: format!("unknown code {code}"),
                    })?;
            }
            "t" => record.type_name = Some(expect_str("type_name", value)?),
            "d" => {
                let ts = expect_int("timestamp", value)?;
                record.timestamp = u64::try_from(ts).map_err(|_| CodecError::InvalidField {
                    field: "timestamp",
                    reason: format!("{ts} out of range"),
                })?;
            }
            _ => return Err(CodecError::UnknownKey { key }),
        }
        seen.push(key);
    }

    record.message = message.ok_or(CodecError::MissingField { field: "message" })?;
    Ok(record)
}

fn expect_str(field: &'static str, node: Node) -> Result<String, CodecError> {
    match node {
        Node::Str(s) => Ok(s),
        _ => Err(CodecError::InvalidField {
            field,
            reason: "expected string".to_owned(),
        }),
    }
}

fn expect_int(field: &'static str, node: Node) -> Result<i128, CodecError> {
    match node {
        Node::Int(n) => Ok(n),
        _ => Err(CodecError::InvalidField {
            field,
            reason: "expected integer".to_owned(),
        }),
    }
}

fn expect_u32(field: &'static str, node: Node) -> Result<u32, CodecError> {
    let n = expect_int(field, node)?;
    u32::try_from(n).map_err(|_| CodecError::InvalidField {
        field,
        reason: format!("{n} out of range"),
    })
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn malformed(&self, reason: impl Into<String>) -> CodecError {
        CodecError::Malformed {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), CodecError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.malformed(format!("expected '{}'", char::from(byte))))
        }
    }

    fn value(&mut self, depth: usize) -> Result<Node, CodecError> {
        if depth > MAX_DEPTH {
            return Err(self.malformed("nesting too deep"));
        }
        self.expect(b'~')?;
        match self.peek() {
            Some(b'\'') => {
                self.pos += 1;
                Ok(Node::Str(self.chars()?))
            }
            Some(b'(') => {
                self.pos += 1;
                self.compound(depth)
            }
            Some(b'-' | b'0'..=b'9') => self.int(),
            Some(_) => Err(self.malformed("unexpected character")),
            None => Err(self.malformed("unexpected end of input")),
        }
    }

    fn compound(&mut self, depth: usize) -> Result<Node, CodecError> {
        match self.peek() {
            Some(b')') => {
                self.pos += 1;
                Ok(Node::List(Vec::new()))
            }
            Some(b'~') => {
                let mut items = Vec::new();
                while self.peek() == Some(b'~') {
                    items.push(self.value(depth + 1)?);
                }
                self.expect(b')')?;
                Ok(Node::List(items))
            }
            Some(_) => {
                let mut fields = Vec::new();
                loop {
                    let key = self.chars()?;
                    if key.is_empty() {
                        return Err(self.malformed("empty key"));
                    }
                    let value = self.value(depth + 1)?;
                    fields.push((key, value));
                    match self.peek() {
                        Some(b'~') => self.pos += 1,
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(Node::Map(fields));
                        }
                        _ => return Err(self.malformed("expected '~' or ')'")),
                    }
                }
            }
            None => Err(self.malformed("unterminated compound")),
        }
    }

    fn int(&mut self) -> Result<Node, CodecError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return Err(self.malformed("expected digits"));
        }
        // 숫자와 '-'만 지났으므로 ASCII
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.malformed("invalid integer"))?;
        text.parse::<i128>()
            .map(Node::Int)
            .map_err(|_| CodecError::Malformed {
                offset: start,
                reason: format!("integer '{text}' out of range"),
            })
    }

    /// `~` 또는 `)` 또는 입력 끝까지 문자를 읽습니다.
    fn chars(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        let mut buf = Vec::new();
        while let Some(b) = self.peek() {
            match b {
                b'~' | b')' => break,
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => buf.push(b),
                b'!' => buf.push(b' '),
                b'*' => {
                    let hex = self
                        .bytes
                        .get(self.pos + 1..self.pos + 3)
                        .ok_or_else(|| self.malformed("truncated escape"))?;
                    let byte = std::str::from_utf8(hex)
                        .ok()
                        .filter(|h| h.bytes().all(|c| c.is_ascii_hexdigit()))
                        .and_then(|h| u8::from_str_radix(h, 16).ok())
                        .ok_or_else(|| self.malformed("invalid escape"))?;
                    buf.push(byte);
                    self.pos += 2;
                }
                _ => return Err(self.malformed("character outside alphabet")),
            }
            self.pos += 1;
        }
        String::from_utf8(buf).map_err(|_| CodecError::Malformed {
            offset: start,
            reason: "invalid utf-8".to_owned(),
        })
    }
}
