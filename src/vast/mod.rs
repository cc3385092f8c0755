//! VAST 文档
//!
//! 只做投放需要的最小校验：XML 必须完整可解析，且根元素为 `VAST`。
//! 不校验 schema / 版本。

pub mod builder;
pub mod tracking;

use std::fmt;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use thiserror::Error;

pub use builder::{error_document, fallback_wrapper, wrapper_document};
pub use tracking::{TrackingTag, TrackingWrapper};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VastParseError {
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("root element is <{0}>, expected <VAST>")]
    WrongRoot(String),
    #[error("document has no root element")]
    Empty,
    #[error("content after the root element")]
    TrailingContent,
}

/// 已通过校验的 VAST 文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VastDocument {
    xml: String,
}

impl VastDocument {
    /// 解析并校验
    pub fn parse(xml: &str) -> Result<Self, VastParseError> {
        let mut reader = Reader::from_str(xml);
        let mut depth: usize = 0;
        let mut seen_root = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| VastParseError::Malformed(e.to_string()))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    if depth == 0 {
                        if seen_root {
                            return Err(VastParseError::TrailingContent);
                        }
                        let name = e.local_name();
                        if name.as_ref() != b"VAST" {
                            return Err(VastParseError::WrongRoot(
                                String::from_utf8_lossy(name.as_ref()).into_owned(),
                            ));
                        }
                        seen_root = true;
                    }
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| VastParseError::Malformed(e.to_string()))?;
                        attr.unescape_value()
                            .map_err(|e| VastParseError::Malformed(e.to_string()))?;
                    }
                    if matches!(event, Event::Start(_)) {
                        depth += 1;
                    }
                }
                Event::End(_) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| VastParseError::Malformed("unbalanced end tag".into()))?;
                }
                Event::Text(ref t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| VastParseError::Malformed(e.to_string()))?;
                    if depth == 0 && !text.trim().is_empty() {
                        return Err(VastParseError::Malformed(
                            "text outside the root element".into(),
                        ));
                    }
                }
                Event::CData(_) if depth == 0 => {
                    return Err(VastParseError::Malformed(
                        "CDATA outside the root element".into(),
                    ));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(VastParseError::Empty);
        }
        if depth != 0 {
            return Err(VastParseError::Malformed("unclosed root element".into()));
        }

        Ok(Self {
            xml: xml.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.xml
    }

    pub fn into_string(self) -> String {
        self.xml
    }

    /// 仅供本模块内部构造已知合法的文档
    pub(crate) fn from_trusted(xml: String) -> Self {
        Self { xml }
    }
}

impl fmt::Display for VastDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xml)
    }
}
