//! Lexer implementation for the query parser
//!
//! 将 OData 表达式字符串按需逐个转换为词法单元。
//!
//! - 字符串字面量使用单引号，`''` 表示转义的单引号
//! - 日期、时间、日期时间、GUID 通过正则在当前位置做前缀匹配
//! - `/` 一律产出 `Slash`，由解析器根据相邻关系区分路径分隔符与除法
//! - `-` 在操作数之后是减号，否则与后续数字合并为负数字面量

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::query::parser::core::position::Position;
use crate::query::parser::lexer::LexError;
use crate::query::parser::{Token, TokenKind as Tk};

fn guid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}",
        )
        .expect("static regex")
    })
}

fn datetime_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|z|[+-]\d{2}:\d{2})?")
            .expect("static regex")
    })
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("static regex"))
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}:\d{2}(:\d{2}(\.\d+)?)?").expect("static regex"))
}

#[derive(Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    /// 当前字节位置
    pos: usize,
    /// 当前字符偏移量，用于报告位置
    offset: usize,
    /// 上一个产出的标记是否结束了一个操作数
    after_operand: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            offset: 0,
            after_operand: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        self.offset += 1;
        Some(ch)
    }

    /// 前进 `len` 个字节（必须落在字符边界上）
    fn advance_bytes(&mut self, len: usize) -> &'a str {
        let text = &self.input[self.pos..self.pos + len];
        self.offset += text.chars().count();
        self.pos += len;
        text
    }

    pub fn current_position(&self) -> Position {
        Position::new(self.offset)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.read_char();
            } else {
                break;
            }
        }
    }

    /// 读取下一个词法单元；输入结束时返回 `Eof`
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.current_position();

        let token = match self.peek_char() {
            None => Token::new(Tk::Eof, String::new(), start),
            Some(ch) => self.scan(ch, start)?,
        };

        self.after_operand = token.kind.ends_operand();
        Ok(token)
    }

    fn scan(&mut self, ch: char, start: Position) -> Result<Token, LexError> {
        let single = |lexer: &mut Self, kind: Tk| -> Result<Token, LexError> {
            lexer.read_char();
            Ok(Token::new(kind, ch.to_string(), start))
        };

        match ch {
            '(' => single(self, Tk::LParen),
            ')' => single(self, Tk::RParen),
            ',' => single(self, Tk::Comma),
            '/' => single(self, Tk::Slash),
            ':' => single(self, Tk::Colon),
            '+' => single(self, Tk::Add),
            '*' => single(self, Tk::Mul),
            '%' => single(self, Tk::Mod),
            '\'' => self.read_string(start),
            '-' => {
                let negative_number = !self.after_operand
                    && (self.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
                        || self.rest()[1..].starts_with("INF"));
                if negative_number {
                    self.read_negative_number(start)
                } else {
                    single(self, Tk::Sub)
                }
            }
            '=' | '!' | '<' | '>' | '&' | '|' => self.read_symbol_operator(ch, start),
            c if c.is_ascii_digit() => self.read_numeric_like(start),
            c if c.is_alphabetic() || c == '_' || c == '$' || c == '@' => {
                if c.is_ascii_hexdigit() {
                    if let Some(m) = guid_regex().find(self.rest()) {
                        if !self.continues_identifier(m.end()) {
                            return self.read_guid(m.end(), start);
                        }
                    }
                }
                self.read_word(start)
            }
            other => Err(LexError::unexpected_character(other, start)),
        }
    }

    fn continues_identifier(&self, byte_len: usize) -> bool {
        self.rest()[byte_len..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn read_symbol_operator(&mut self, ch: char, start: Position) -> Result<Token, LexError> {
        let two: String = self.rest().chars().take(2).collect();
        let (kind, len) = match two.as_str() {
            "==" => (Tk::Eq, 2),
            "!=" | "<>" => (Tk::Ne, 2),
            ">=" => (Tk::Ge, 2),
            "<=" => (Tk::Le, 2),
            "&&" => (Tk::And, 2),
            "||" => (Tk::Or, 2),
            _ => match ch {
                '=' => (Tk::Eq, 1),
                '>' => (Tk::Gt, 1),
                '<' => (Tk::Lt, 1),
                '!' => (Tk::Not, 1),
                other => return Err(LexError::unexpected_character(other, start)),
            },
        };
        let lexeme = self.advance_bytes(len).to_string();
        Ok(Token::new(kind, lexeme, start))
    }

    /// 读取单引号字符串，`''` 转义为 `'`
    fn read_string_body(&mut self, start: Position) -> Result<String, LexError> {
        // 开头的引号
        self.read_char();
        let mut result = String::new();

        loop {
            match self.read_char() {
                Some('\'') => {
                    if self.peek_char() == Some('\'') {
                        self.read_char();
                        result.push('\'');
                    } else {
                        return Ok(result);
                    }
                }
                Some(c) => result.push(c),
                None => return Err(LexError::unterminated_string(start)),
            }
        }
    }

    fn read_string(&mut self, start: Position) -> Result<Token, LexError> {
        let begin = self.pos;
        let value = self.read_string_body(start)?;
        let lexeme = self.input[begin..self.pos].to_string();
        Ok(Token::new(Tk::String(value), lexeme, start))
    }

    fn read_negative_number(&mut self, start: Position) -> Result<Token, LexError> {
        if self.rest().starts_with("-INF") && !self.continues_identifier(4) {
            let lexeme = self.advance_bytes(4).to_string();
            return Ok(Token::new(Tk::Decimal(f64::NEG_INFINITY), lexeme, start));
        }
        let begin = self.pos;
        self.read_char();
        let token = self.read_number(start)?;
        let lexeme = self.input[begin..self.pos].to_string();
        let kind = match token.kind {
            Tk::Integer(i) => Tk::Integer(-i),
            Tk::Decimal(d) => Tk::Decimal(-d),
            other => other,
        };
        Ok(Token::new(kind, lexeme, start))
    }

    /// 以数字开头：日期时间、日期、GUID、时间或数字
    fn read_numeric_like(&mut self, start: Position) -> Result<Token, LexError> {
        let rest = self.rest();

        if let Some(m) = datetime_regex().find(rest) {
            let text = self.advance_bytes(m.end()).to_string();
            let value = parse_datetime_offset(&text)
                .ok_or_else(|| LexError::invalid_literal("DateTimeOffset", &text, start))?;
            return Ok(Token::new(Tk::DateTimeOffset(value), text, start));
        }

        if let Some(m) = guid_regex().find(rest) {
            if !self.continues_identifier(m.end()) {
                return self.read_guid(m.end(), start);
            }
        }

        if let Some(m) = date_regex().find(rest) {
            let text = self.advance_bytes(m.end()).to_string();
            let value = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map_err(|_| LexError::invalid_literal("Date", &text, start))?;
            return Ok(Token::new(Tk::Date(value), text, start));
        }

        if let Some(m) = time_regex().find(rest) {
            let text = self.advance_bytes(m.end()).to_string();
            let value = parse_time_of_day(&text)
                .ok_or_else(|| LexError::invalid_literal("TimeOfDay", &text, start))?;
            return Ok(Token::new(Tk::TimeOfDay(value), text, start));
        }

        self.read_number(start)
    }

    fn read_guid(&mut self, len: usize, start: Position) -> Result<Token, LexError> {
        let text = self.advance_bytes(len).to_string();
        let value =
            Uuid::parse_str(&text).map_err(|_| LexError::invalid_literal("Guid", &text, start))?;
        Ok(Token::new(Tk::Guid(value), text, start))
    }

    fn read_number(&mut self, start: Position) -> Result<Token, LexError> {
        let begin = self.pos;
        let mut is_decimal = false;

        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.read_char();
        }

        if self.peek_char() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            is_decimal = true;
            self.read_char();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.read_char();
            }
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let sign_len = usize::from(matches!(self.peek_nth(1), Some('+') | Some('-')));
            if self.peek_nth(1 + sign_len).is_some_and(|c| c.is_ascii_digit()) {
                is_decimal = true;
                for _ in 0..=sign_len {
                    self.read_char();
                }
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.read_char();
                }
            }
        }

        let text = self.input[begin..self.pos].to_string();

        // 类型后缀：12L、1.5m、2.0d、3f
        if let Some(suffix) = self.peek_char() {
            if matches!(suffix, 'm' | 'M' | 'd' | 'D' | 'f' | 'F' | 'l' | 'L')
                && !self.continues_identifier(suffix.len_utf8())
            {
                self.read_char();
                if matches!(suffix, 'm' | 'M' | 'd' | 'D' | 'f' | 'F') {
                    is_decimal = true;
                }
            }
        }

        if self.continues_identifier(0) {
            let bad: String = self.rest().chars().take_while(|c| c.is_alphanumeric()).collect();
            return Err(LexError::invalid_number(format!("{}{}", text, bad), start));
        }

        let lexeme = self.input[begin..self.pos].to_string();
        if !is_decimal {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Token::new(Tk::Integer(i), lexeme, start));
            }
        }
        let value = text
            .parse::<f64>()
            .map_err(|e| LexError::invalid_number(format!("{} ({})", text, e), start))?;
        Ok(Token::new(Tk::Decimal(value), lexeme, start))
    }

    fn read_identifier(&mut self) -> &'a str {
        let begin = self.pos;
        if matches!(self.peek_char(), Some('$') | Some('@')) {
            self.read_char();
        }
        loop {
            match self.peek_char() {
                Some(c) if c.is_alphanumeric() || c == '_' => {
                    self.read_char();
                }
                // 限定名：Edm.Int32、geo.distance、Namespace.Color
                Some('.') if self.peek_nth(1).is_some_and(|c| c.is_alphabetic()) => {
                    self.read_char();
                }
                _ => break,
            }
        }
        &self.input[begin..self.pos]
    }

    fn read_word(&mut self, start: Position) -> Result<Token, LexError> {
        let word = self.read_identifier();

        // 带类型前缀的字面量：geography'...'、duration'...'、Ns.Color'Red'
        if self.peek_char() == Some('\'') && !word.starts_with('$') {
            let body = self.read_string_body(start)?;
            let lexeme = format!("{}'{}'", word, body.replace('\'', "''"));
            let kind = match word.to_ascii_lowercase().as_str() {
                "geography" => Tk::Geography(body),
                "geometry" => Tk::Geometry(body),
                "duration" => Tk::Duration(body),
                "guid" => Tk::Guid(
                    Uuid::parse_str(&body)
                        .map_err(|_| LexError::invalid_literal("Guid", &body, start))?,
                ),
                "date" => Tk::Date(
                    NaiveDate::parse_from_str(&body, "%Y-%m-%d")
                        .map_err(|_| LexError::invalid_literal("Date", &body, start))?,
                ),
                "datetimeoffset" | "datetime" => Tk::DateTimeOffset(
                    parse_datetime_offset(&body)
                        .ok_or_else(|| LexError::invalid_literal("DateTimeOffset", &body, start))?,
                ),
                _ => Tk::Enum {
                    type_name: word.to_string(),
                    member: body,
                },
            };
            return Ok(Token::new(kind, lexeme, start));
        }

        let kind = match word {
            "INF" => Tk::Decimal(f64::INFINITY),
            "NaN" => Tk::Decimal(f64::NAN),
            _ => keyword(word).unwrap_or_else(|| Tk::Identifier(word.to_string())),
        };
        Ok(Token::new(kind, word.to_string(), start))
    }
}

/// 关键字匹配：全小写或全大写形式
fn keyword(word: &str) -> Option<Tk> {
    let is_upper = word.chars().all(|c| c.is_ascii_uppercase());
    let is_lower = word.chars().all(|c| c.is_ascii_lowercase());
    if !is_upper && !is_lower {
        return None;
    }
    let kind = match word.to_ascii_lowercase().as_str() {
        "eq" => Tk::Eq,
        "ne" => Tk::Ne,
        "gt" => Tk::Gt,
        "ge" => Tk::Ge,
        "lt" => Tk::Lt,
        "le" => Tk::Le,
        "has" => Tk::Has,
        "in" => Tk::In,
        "and" => Tk::And,
        "or" => Tk::Or,
        "not" => Tk::Not,
        "add" => Tk::Add,
        "sub" => Tk::Sub,
        "mul" => Tk::Mul,
        "div" => Tk::Div,
        "divby" => Tk::DivBy,
        "mod" => Tk::Mod,
        "true" => Tk::Boolean(true),
        "false" => Tk::Boolean(false),
        "null" => Tk::Null,
        _ => return None,
    };
    Some(kind)
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// 解析 ISO-8601 日期时间；缺少秒或时区时分别补 `:00` 与 `Z`
pub(crate) fn parse_datetime_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    let (date_part, time_part) = text.split_once(['T', 't'])?;
    let zone_start = time_part
        .find(['Z', 'z', '+', '-'])
        .unwrap_or(time_part.len());
    let (clock, zone) = time_part.split_at(zone_start);
    let clock = if clock.matches(':').count() == 1 {
        format!("{}:00", clock)
    } else {
        clock.to_string()
    };
    let zone = if zone.is_empty() { "Z" } else { zone };
    DateTime::parse_from_rfc3339(&format!("{}T{}{}", date_part, clock, zone)).ok()
}

/// 一次性切分整个输入
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.is_eof();
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
