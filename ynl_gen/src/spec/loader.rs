use crate::error::{GenError, GenResult};
use std::fs;
use std::path::Path;
use ynl_types::FamilySpec;

const LICENSE_PREFIX: &str = "# SPDX-License-Identifier: ";

/// The only license generated files may be released under.
pub const ACCEPTED_LICENSE: &str = "((GPL-2.0 WITH Linux-syscall-note) OR BSD-3-Clause)";

/// A family spec together with the license tag from its first line.
#[derive(Debug, Clone)]
pub struct SpecFile {
    pub license: String,
    pub family: FamilySpec,
}

impl SpecFile {
    pub fn load(path: &Path) -> GenResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| GenError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> GenResult<Self> {
        let first = text.lines().next().unwrap_or_default().trim();
        let license = first
            .strip_prefix(LICENSE_PREFIX)
            .ok_or(GenError::MissingLicense)?
            .to_string();

        let family: FamilySpec = serde_yml::from_str(text)?;
        Ok(Self { license, family })
    }

    pub fn check_license(&self) -> GenResult<()> {
        if self.license != ACCEPTED_LICENSE {
            return Err(GenError::License {
                found: self.license.clone(),
                expected: ACCEPTED_LICENSE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_line_required() {
        let err = SpecFile::parse("name: x\n").unwrap_err();
        assert!(matches!(err, GenError::MissingLicense));
    }

    #[test]
    fn test_license_checked() {
        let spec = SpecFile::parse("# SPDX-License-Identifier: MIT\nname: x\n").unwrap();
        assert_eq!(spec.license, "MIT");
        assert!(matches!(spec.check_license(), Err(GenError::License { .. })));

        let text = format!("{}{}\nname: x\n", LICENSE_PREFIX, ACCEPTED_LICENSE);
        let spec = SpecFile::parse(&text).unwrap();
        assert!(spec.check_license().is_ok());
        assert_eq!(spec.family.name, "x");
    }
}
