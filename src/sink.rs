use crate::error::{AccountViewError, Result};
use crate::views::ViewsDocument;
use log::{debug, info};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Destination for the final document of a run.
pub trait ViewSink {
    fn write(&self, document: &ViewsDocument) -> Result<()>;
}

/// Pretty-prints with the given indent width. Non-ASCII text is written as is.
pub fn to_json_string(document: &ViewsDocument, indent: usize) -> Result<String> {
    let indent = " ".repeat(indent);
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    document.serialize(&mut serializer)?;
    String::from_utf8(buffer).map_err(|e| {
        AccountViewError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Writes the document as a standalone JSON file, replacing any existing file.
pub struct JsonFileSink {
    path: PathBuf,
    indent: usize,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>, indent: usize) -> Self {
        Self {
            path: path.into(),
            indent,
        }
    }
}

impl ViewSink for JsonFileSink {
    fn write(&self, document: &ViewsDocument) -> Result<()> {
        let json = to_json_string(document, self.indent)?;
        fs::write(&self.path, json)?;
        info!("Wrote {} views to '{}'", document.calculated_views.len(), self.path.display());
        Ok(())
    }
}

/// Embeds the document into an existing HTML page as a JavaScript object
/// literal assigned to `variable`.
///
/// An existing `const|let|var <variable> = {...};` definition has its object
/// replaced; otherwise the definition is injected before the first
/// `</script>`. The page is never created.
pub struct HtmlSink {
    path: PathBuf,
    variable: String,
    indent: usize,
}

impl HtmlSink {
    pub fn new(path: impl Into<PathBuf>, variable: impl Into<String>, indent: usize) -> Self {
        Self {
            path: path.into(),
            variable: variable.into(),
            indent,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the patched page content without touching the file system.
    pub fn patch(&self, html: &str, json: &str) -> Result<String> {
        let pattern = format!(
            r"(?s)(const|let|var)\s+{}\s*=\s*(\{{.*?\}});",
            regex::escape(&self.variable)
        );
        let definition = Regex::new(&pattern).map_err(|e| {
            AccountViewError::InvalidConfig(format!(
                "cannot build pattern for variable '{}': {}",
                self.variable, e
            ))
        })?;

        if let Some(object) = definition.captures(html).and_then(|c| c.get(2)) {
            debug!("Replacing existing '{}' definition", self.variable);
            let mut patched = String::with_capacity(html.len() + json.len());
            patched.push_str(&html[..object.start()]);
            patched.push_str(json);
            patched.push_str(&html[object.end()..]);
            return Ok(patched);
        }

        if let Some(script_end) = html.find("</script>") {
            debug!("No '{}' definition found; injecting one before </script>", self.variable);
            let injection = format!(
                "\n\n        // Data injected by account-views:\n        const {} = {};\n\n        ",
                self.variable, json
            );
            let mut patched = String::with_capacity(html.len() + injection.len());
            patched.push_str(&html[..script_end]);
            patched.push_str(&injection);
            patched.push_str(&html[script_end..]);
            return Ok(patched);
        }

        Err(AccountViewError::SinkPatternNotFound {
            path: self.path.clone(),
            variable: self.variable.clone(),
        })
    }
}

impl ViewSink for HtmlSink {
    fn write(&self, document: &ViewsDocument) -> Result<()> {
        if !self.path.exists() {
            return Err(AccountViewError::SinkTargetMissing(self.path.clone()));
        }

        let html = fs::read_to_string(&self.path)?;
        let json = to_json_string(document, self.indent)?;
        let patched = self.patch(&html, &json)?;
        fs::write(&self.path, patched)?;
        info!("Page '{}' updated", self.path.display());
        Ok(())
    }
}
