//! Parsing of physiology-modification instruction documents.
//!
//! A modification arrives from the middleware as XML:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <PhysiologyModification type="AirwayObstruction"><Severity>0.5</Severity></PhysiologyModification>
//! ```
//!
//! The `type` attribute is matched case-insensitively.

use thiserror::Error;

/// Root element name of an instruction document.
pub const ROOT_ELEMENT: &str = "PhysiologyModification";

/// A recognised instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysmodAction {
    /// Partial or full airway obstruction.
    AirwayObstruction {
        /// Obstruction severity, `0.0`–`1.0`.
        severity: f64,
    },
    /// A well-formed instruction of a type the bridge does not act on.
    Unhandled {
        /// Lower-cased `type` attribute.
        kind: String,
    },
}

/// Reasons an instruction document could not be interpreted.
#[derive(Debug, Error)]
pub enum PhysmodError {
    /// The payload is not well-formed XML.
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The root element is not `<PhysiologyModification>`.
    #[error("root element is <{0}>, expected <PhysiologyModification>")]
    UnexpectedRoot(String),

    /// The root element has no `type` attribute.
    #[error("missing type attribute")]
    MissingType,

    /// An airway obstruction without a `<Severity>` value.
    #[error("missing Severity element")]
    MissingSeverity,

    /// A `<Severity>` value that is not a number.
    #[error("invalid severity {0:?}")]
    InvalidSeverity(String),
}

/// Parses an instruction document.
///
/// # Errors
///
/// See [`PhysmodError`].  [`PhysmodError::Xml`] means the whole document was
/// unreadable; the other variants mean it was readable but incomplete.
pub fn parse_physiology_modification(xml: &str) -> Result<PhysmodAction, PhysmodError> {
    let document = roxmltree::Document::parse(xml)?;
    let root = document.root_element();
    if !root.has_tag_name(ROOT_ELEMENT) {
        return Err(PhysmodError::UnexpectedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    let kind = root
        .attribute("type")
        .ok_or(PhysmodError::MissingType)?
        .to_lowercase();

    match kind.as_str() {
        "airwayobstruction" => {
            let text = root
                .children()
                .find(|node| node.has_tag_name("Severity"))
                .and_then(|node| node.text())
                .ok_or(PhysmodError::MissingSeverity)?
                .trim();
            let severity = text
                .parse::<f64>()
                .map_err(|_| PhysmodError::InvalidSeverity(text.to_string()))?;
            Ok(PhysmodAction::AirwayObstruction { severity })
        }
        _ => Ok(PhysmodAction::Unhandled { kind }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
