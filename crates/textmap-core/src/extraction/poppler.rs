use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::xhtml::parse_bbox_layout;
use super::{PageWords, PdfSource};
use crate::error::TextmapError;
use crate::model::Granularity;

/// PDF source backed by poppler-utils.
///
/// `pdfinfo` supplies the page count and encryption state; each page is
/// read with `pdftotext -bbox-layout -f N -l N`.
pub struct PopplerSource {
    path: PathBuf,
    name: String,
    info: Option<DocumentInfo>,
    encrypted: bool,
    unlock: Option<Unlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DocumentInfo {
    pages: usize,
    encrypted: bool,
}

/// Password accepted by poppler, with the flag it was accepted under.
#[derive(Debug, Clone)]
struct Unlock {
    flag: &'static str,
    password: String,
}

impl PopplerSource {
    /// Probe the document with `pdfinfo`.
    ///
    /// A document that needs a password opens in a locked state;
    /// [`PdfSource::decrypt`] must be called before reading pages.
    pub fn open(path: &Path) -> Result<Self, TextmapError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut source = PopplerSource {
            path: path.to_path_buf(),
            name,
            info: None,
            encrypted: false,
            unlock: None,
        };

        match source.pdfinfo(None) {
            Ok(info) => {
                source.encrypted = info.encrypted;
                source.info = Some(info);
            }
            Err(TextmapError::Decryption(_)) => {
                log::debug!("{} requires a password", path.display());
                source.encrypted = true;
            }
            Err(e) => return Err(e),
        }

        log::info!("PDF opened: {}", path.display());
        Ok(source)
    }

    /// Fail with [`TextmapError::PopplerNotFound`] unless both `pdfinfo` and
    /// `pdftotext` can be started.
    pub fn ensure_tools() -> Result<(), TextmapError> {
        for tool in ["pdfinfo", "pdftotext"] {
            check_tool(tool)?;
        }
        Ok(())
    }

    fn command(&self, tool: &'static str, unlock: Option<&Unlock>) -> Command {
        let mut cmd = Command::new(tool);
        if let Some(unlock) = unlock {
            cmd.arg(unlock.flag).arg(&unlock.password);
        }
        cmd
    }

    fn pdfinfo(&self, unlock: Option<&Unlock>) -> Result<DocumentInfo, TextmapError> {
        let mut cmd = self.command("pdfinfo", unlock);
        cmd.arg(&self.path);
        let output = run(cmd, "pdfinfo")?;
        if !output.status.success() {
            return Err(failure("pdfinfo", &self.path, &output));
        }
        parse_pdfinfo(&String::from_utf8_lossy(&output.stdout)).map_err(|reason| {
            TextmapError::Read {
                path: self.path.clone(),
                reason,
            }
        })
    }
}

impl PdfSource for PopplerSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn decrypt(&mut self, password: Option<&str>) -> Result<(), TextmapError> {
        if self.info.is_some() {
            if !self.encrypted {
                log::info!("PDF is not encrypted");
            } else if password.is_some() {
                log::info!("PDF opens without a user password; supplied password not needed");
            }
            return Ok(());
        }

        let password = password.ok_or_else(|| {
            TextmapError::Decryption("PDF is encrypted and requires a password".into())
        })?;

        for flag in ["-upw", "-opw"] {
            let unlock = Unlock {
                flag,
                password: password.to_string(),
            };
            match self.pdfinfo(Some(&unlock)) {
                Ok(info) => {
                    let kind = if flag == "-opw" { "owner" } else { "user" };
                    log::info!("PDF decrypted successfully ({kind} password)");
                    self.info = Some(info);
                    self.unlock = Some(unlock);
                    return Ok(());
                }
                Err(TextmapError::Decryption(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(TextmapError::Decryption("invalid password".into()))
    }

    fn page_count(&self) -> Result<usize, TextmapError> {
        self.info
            .map(|info| info.pages)
            .ok_or_else(|| TextmapError::Decryption("PDF is locked; decrypt it first".into()))
    }

    fn page_words(
        &self,
        page_number: usize,
        granularity: Granularity,
    ) -> Result<PageWords, TextmapError> {
        let page = page_number.to_string();
        let mut cmd = self.command("pdftotext", self.unlock.as_ref());
        cmd.arg("-bbox-layout")
            .args(["-enc", "UTF-8"])
            .args(["-f", page.as_str(), "-l", page.as_str()])
            .arg(&self.path)
            .arg("-");
        let output = run(cmd, "pdftotext")?;
        if !output.status.success() {
            return Err(failure("pdftotext", &self.path, &output));
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let read_error = |reason: String| TextmapError::Read {
            path: self.path.clone(),
            reason: format!("page {page_number}: {reason}"),
        };
        parse_bbox_layout(&xml, page_number, granularity)
            .map_err(read_error)?
            .into_iter()
            .next()
            .ok_or_else(|| read_error("pdftotext returned no page".into()))
    }

    fn backend_name(&self) -> &str {
        "poppler"
    }
}

fn run(mut cmd: Command, tool: &'static str) -> Result<Output, TextmapError> {
    cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TextmapError::PopplerNotFound { tool }
        } else {
            TextmapError::Io(e)
        }
    })
}

/// Start `tool -v`; only a failure to launch it is an error.
fn check_tool(tool: &'static str) -> Result<(), TextmapError> {
    let mut cmd = Command::new(tool);
    cmd.arg("-v");
    run(cmd, tool).map(|_| ())
}

fn failure(tool: &'static str, path: &Path, output: &Output) -> TextmapError {
    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    classify_failure(tool, path, code, stderr.trim())
}

/// Map a poppler exit status onto the error taxonomy.
///
/// Exit code 1 means the document could not be opened, 3 a permission
/// problem. A password failure is reported on stderr with either code.
fn classify_failure(tool: &'static str, path: &Path, code: i32, stderr: &str) -> TextmapError {
    if stderr.contains("Incorrect password") {
        return TextmapError::Decryption("incorrect or missing password".into());
    }
    match code {
        1 | 3 => TextmapError::Read {
            path: path.to_path_buf(),
            reason: if stderr.is_empty() {
                format!("{tool} could not open the document")
            } else {
                stderr.to_string()
            },
        },
        _ => TextmapError::PopplerFailed {
            tool,
            code,
            stderr: stderr.to_string(),
        },
    }
}

fn parse_pdfinfo(stdout: &str) -> Result<DocumentInfo, String> {
    let mut pages = None;
    let mut encrypted = false;

    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "Pages" => {
                pages = Some(
                    value
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| format!("invalid page count '{}'", value.trim()))?,
                );
            }
            "Encrypted" => encrypted = value.trim_start().starts_with("yes"),
            _ => {}
        }
    }

    let pages = pages.ok_or_else(|| "pdfinfo did not report a page count".to_string())?;
    Ok(DocumentInfo { pages, encrypted })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pdfinfo() {
        let out = "Title:          Menu\n\
                   Producer:       LibreOffice\n\
                   Encrypted:      yes (print:yes copy:no change:no addNotes:no)\n\
                   Pages:          12\n\
                   Page size:      612 x 792 pts (letter)\n";
        let info = parse_pdfinfo(out).unwrap();
        assert_eq!(info.pages, 12);
        assert!(info.encrypted);

        let plain = parse_pdfinfo("Encrypted:      no\nPages:          1\n").unwrap();
        assert!(!plain.encrypted);
    }

    #[test]
    fn test_parse_pdfinfo_without_pages() {
        assert!(parse_pdfinfo("Title: x\n").is_err());
        assert!(parse_pdfinfo("Pages: many\n").is_err());
    }

    #[test]
    fn test_classify_failure() {
        let path = Path::new("a.pdf");
        assert!(matches!(
            classify_failure("pdfinfo", path, 1, "Command Line Error: Incorrect password"),
            TextmapError::Decryption(_)
        ));
        assert!(matches!(
            classify_failure("pdfinfo", path, 1, "Syntax Error: Couldn't find trailer dictionary"),
            TextmapError::Read { .. }
        ));
        assert!(matches!(
            classify_failure("pdftotext", path, 99, "boom"),
            TextmapError::PopplerFailed { code: 99, .. }
        ));
    }

    #[test]
    fn test_missing_tool_is_poppler_not_found() {
        let err = check_tool("textmap-no-such-poppler-tool").unwrap_err();
        assert!(matches!(
            err,
            TextmapError::PopplerNotFound {
                tool: "textmap-no-such-poppler-tool"
            }
        ));
        assert!(err.to_string().contains("poppler-utils"));
    }
}
