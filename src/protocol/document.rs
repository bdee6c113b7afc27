//! Response document rendering.
//!
//! A document is a status marker plus zero or more typed rowsets; each row
//! is an ordered list of named fields. Field values are opaque text: they
//! are wrapped in CDATA sections and an embedded `]]>` is split across two
//! sections so it can never terminate the wrapper. Field names are fixed
//! protocol identifiers, never caller input.
//!
//! An absent value renders the explicit `null` placeholder instead of being
//! omitted, so consumers that parse rows by position never desynchronize.

use crate::scheduler::status::TaskStatusRecord;

/// Status marker text carried by every successful execute response.
pub const INFO_SUCCESS: &str = "Done with success";

/// Placeholder rendered for an absent field value.
pub const NULL_PLACEHOLDER: &str = "null";

/// One named field within a row.
#[derive(Debug, Clone)]
pub struct Field {
    /// Protocol identifier of the field.
    pub name: &'static str,
    /// Value, or `None` to render the placeholder.
    pub value: Option<String>,
}

/// One row of a rowset. Field order is preserved verbatim.
#[derive(Debug, Clone, Default)]
pub struct Row {
    fields: Vec<Field>,
}

impl Row {
    /// Create an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. `None` renders the `null` placeholder.
    #[must_use]
    pub fn with_field(mut self, name: &'static str, value: Option<String>) -> Self {
        self.fields.push(Field { name, value });
        self
    }
}

/// A typed collection of rows.
#[derive(Debug, Clone, Default)]
pub struct Rowset {
    kind: Option<&'static str>,
    rows: Vec<Row>,
}

impl Rowset {
    /// Create an untyped rowset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a rowset with a `type` attribute.
    #[must_use]
    pub fn typed(kind: &'static str) -> Self {
        Self {
            kind: Some(kind),
            rows: Vec::new(),
        }
    }

    /// Append a row.
    #[must_use]
    pub fn with_row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }
}

/// A complete response document.
#[derive(Debug, Clone)]
pub struct Document {
    info: &'static str,
    rowsets: Vec<Rowset>,
}

impl Document {
    /// A success document with no rowsets (marker only).
    #[must_use]
    pub fn success() -> Self {
        Self {
            info: INFO_SUCCESS,
            rowsets: Vec::new(),
        }
    }

    /// Append a rowset.
    #[must_use]
    pub fn with_rowset(mut self, rowset: Rowset) -> Self {
        self.rowsets.push(rowset);
        self
    }

    /// Render the document to its wire form.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("<info>");
        push_cdata(&mut out, self.info);
        out.push_str("</info>");
        for rowset in &self.rowsets {
            match rowset.kind {
                Some(kind) => {
                    out.push_str("<rowset type=\"");
                    out.push_str(kind);
                    out.push_str("\">");
                }
                None => out.push_str("<rowset>"),
            }
            for row in &rowset.rows {
                out.push_str("<row>");
                for field in &row.fields {
                    out.push_str("<field name=\"");
                    out.push_str(field.name);
                    out.push_str("\">");
                    push_cdata(&mut out, field.value.as_deref().unwrap_or(NULL_PLACEHOLDER));
                    out.push_str("</field>");
                }
                out.push_str("</row>");
            }
            out.push_str("</rowset>");
        }
        out
    }
}

/// The fixed session descriptor returned by GetSessionInfo.
#[must_use]
pub fn session_descriptor() -> Document {
    Document::success().with_rowset(
        Rowset::typed("user").with_row(
            Row::new()
                .with_field("valid", Some("true".to_owned()))
                .with_field("user", Some("admin".to_owned()))
                .with_field("guestUser", Some("guest".to_owned()))
                .with_field("lastName", Some("admin".to_owned()))
                .with_field("firstName", Some("admin".to_owned()))
                .with_field("email", Some("none".to_owned())),
        ),
    )
}

/// One rowset with a row per task status record, fields in record order.
#[must_use]
pub fn task_status(records: &[TaskStatusRecord]) -> Document {
    let mut rowset = Rowset::new();
    for record in records {
        let mut row = Row::new();
        for field in record.fields() {
            row = row.with_field(field.name, field.value);
        }
        rowset = rowset.with_row(row);
    }
    Document::success().with_rowset(rowset)
}

/// Error document for a failed request.
#[must_use]
pub fn error_document(message: &str) -> String {
    let mut out = String::from("<error>");
    push_cdata(&mut out, message);
    out.push_str("</error>");
    out
}

/// Append `value` wrapped in CDATA, splitting any embedded `]]>`.
fn push_cdata(out: &mut String, value: &str) {
    out.push_str("<![CDATA[");
    out.push_str(&value.replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]>");
}
