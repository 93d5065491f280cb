use crate::consts::{FITS_BLOCK_SIZE, FITS_CARD_SIZE};
use crate::error::{PlotError, Result};

/// Value of a header card.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

/// One 80-character header record.
#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<HeaderValue>,
    pub comment: Option<String>,
}

/// Ordered FITS header. Lookups are by keyword, first match wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<Card>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse header cards starting at the beginning of `buf` up to and
    /// including the END card. Returns the header and the number of bytes it
    /// occupies, rounded up to a whole block.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let mut cards = Vec::new();
        let mut offset = 0;
        loop {
            if offset + FITS_CARD_SIZE > buf.len() {
                return Err(PlotError::parse("header has no END card"));
            }
            let raw = &buf[offset..offset + FITS_CARD_SIZE];
            offset += FITS_CARD_SIZE;
            let keyword = String::from_utf8_lossy(&raw[..8]).trim_end().to_string();
            if keyword == "END" {
                break;
            }
            if keyword.is_empty() {
                continue;
            }
            cards.push(parse_card(keyword, raw)?);
        }
        let consumed = offset.div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE;
        Ok((Self { cards }, consumed))
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|c| c.keyword == keyword)
            .and_then(|c| c.value.as_ref())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.cards.iter().any(|c| c.keyword == keyword)
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    pub fn get_bool(&self, keyword: &str) -> Option<bool> {
        self.get(keyword).and_then(HeaderValue::as_bool)
    }

    /// Replace the first card with this keyword, or append a new one.
    pub fn set(&mut self, keyword: &str, value: HeaderValue) {
        if let Some(card) = self.cards.iter_mut().find(|c| c.keyword == keyword) {
            card.value = Some(value);
        } else {
            self.cards.push(Card {
                keyword: keyword.to_string(),
                value: Some(value),
                comment: None,
            });
        }
    }

    pub fn set_f64(&mut self, keyword: &str, value: f64) {
        self.set(keyword, HeaderValue::Float(value));
    }

    pub fn set_i64(&mut self, keyword: &str, value: i64) {
        self.set(keyword, HeaderValue::Integer(value));
    }

    pub fn set_str(&mut self, keyword: &str, value: impl Into<String>) {
        self.set(keyword, HeaderValue::Text(value.into()));
    }

    /// Append a card as-is, after any existing cards.
    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn remove(&mut self, keyword: &str) {
        self.cards.retain(|c| c.keyword != keyword);
    }

    pub fn add_history(&mut self, text: impl Into<String>) {
        self.cards.push(Card {
            keyword: "HISTORY".into(),
            value: None,
            comment: Some(text.into()),
        });
    }

    /// Serialize to whole blocks, END card included, space padded.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity((self.cards.len() + 1) * FITS_CARD_SIZE);
        for card in &self.cards {
            out.extend_from_slice(format_card(card).as_bytes());
        }
        out.extend_from_slice(format!("{:<80}", "END").as_bytes());
        let padded = out.len().div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE;
        out.resize(padded, b' ');
        out
    }
}

fn parse_card(keyword: String, raw: &[u8]) -> Result<Card> {
    if !raw.is_ascii() {
        return Err(PlotError::parse(format!("non-ASCII header card {keyword}")));
    }
    let text = String::from_utf8_lossy(raw);
    if &raw[8..10] != b"= " || keyword == "COMMENT" || keyword == "HISTORY" {
        let commentary = text[8..].trim_end().to_string();
        return Ok(Card {
            keyword,
            value: None,
            comment: (!commentary.is_empty()).then_some(commentary),
        });
    }

    let body = text[10..].trim_start();
    if let Some(rest) = body.strip_prefix('\'') {
        let (value, remainder) = parse_quoted(rest)
            .ok_or_else(|| PlotError::parse(format!("unterminated string in {keyword}")))?;
        return Ok(Card {
            keyword,
            value: Some(HeaderValue::Text(value)),
            comment: trailing_comment(remainder),
        });
    }

    let (token, comment) = match body.find('/') {
        Some(pos) => (body[..pos].trim(), trailing_comment(&body[pos..])),
        None => (body.trim(), None),
    };
    let value = parse_scalar(token)
        .map_err(|_| PlotError::parse(format!("bad value for {keyword}: {token}")))?;
    Ok(Card {
        keyword,
        value,
        comment,
    })
}

fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                value.push('\'');
                chars.next();
            } else {
                return Some((value.trim_end().to_string(), &s[i + 1..]));
            }
        } else {
            value.push(c);
        }
    }
    None
}

fn trailing_comment(s: &str) -> Option<String> {
    let c = s.trim().trim_start_matches('/').trim();
    (!c.is_empty()).then(|| c.to_string())
}

fn parse_scalar(token: &str) -> std::result::Result<Option<HeaderValue>, ()> {
    match token {
        "" => Ok(None),
        "T" => Ok(Some(HeaderValue::Logical(true))),
        "F" => Ok(Some(HeaderValue::Logical(false))),
        _ => {
            if let Ok(i) = token.parse::<i64>() {
                return Ok(Some(HeaderValue::Integer(i)));
            }
            token
                .replace(['D', 'd'], "E")
                .parse::<f64>()
                .map(|f| Some(HeaderValue::Float(f)))
                .map_err(|_| ())
        }
    }
}

fn format_card(card: &Card) -> String {
    let mut line = match &card.value {
        None => format!(
            "{:<8}{}",
            card.keyword,
            card.comment.as_deref().unwrap_or_default()
        ),
        Some(value) => {
            let v = match value {
                HeaderValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
                HeaderValue::Integer(i) => format!("{i:>20}"),
                HeaderValue::Float(f) => format!("{:>20}", format_float(*f)),
                HeaderValue::Text(s) => format!("'{:<8}'", s.replace('\'', "''")),
            };
            match &card.comment {
                Some(c) => format!("{:<8}= {v} / {c}", card.keyword),
                None => format!("{:<8}= {v}", card.keyword),
            }
        }
    };
    line.truncate(FITS_CARD_SIZE);
    format!("{line:<80}")
}

fn format_float(v: f64) -> String {
    let abs = v.abs();
    let s = if abs == 0.0 || (1e-4..1e15).contains(&abs) {
        format!("{v:?}")
    } else {
        format!("{v:E}")
    };
    if s.len() > 20 {
        format!("{v:.12E}")
    } else {
        s
    }
}
