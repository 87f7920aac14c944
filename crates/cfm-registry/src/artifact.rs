//! Artifact file names such as `attrs-23.1.0-pyhd8ed1ab_0.conda`.

use std::{fmt, str::FromStr};

use crate::error::{RegistryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Conda,
    TarBz2,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Conda => ".conda",
            ArtifactKind::TarBz2 => ".tar.bz2",
        }
    }
}

/// A parsed `<name>-<version>-<build><ext>` artifact file name.
///
/// The name may itself contain dashes; version and build may not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    pub name: String,
    pub version: String,
    pub build: String,
    pub kind: ArtifactKind,
}

impl ArtifactName {
    /// The file name without its extension.
    pub fn stem(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build)
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem(), self.kind.extension())
    }
}

impl FromStr for ArtifactName {
    type Err = RegistryError;

    fn from_str(artifact: &str) -> Result<Self> {
        let (stem, kind) = if let Some(stem) = artifact.strip_suffix(".conda") {
            (stem, ArtifactKind::Conda)
        } else if let Some(stem) = artifact.strip_suffix(".tar.bz2") {
            (stem, ArtifactKind::TarBz2)
        } else {
            return Err(RegistryError::unsupported(
                artifact,
                "not a conda package, expected a `.conda` or `.tar.bz2` extension",
            ));
        };

        let mut parts = stem.rsplitn(3, '-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(build), Some(version), Some(name))
                if !build.is_empty() && !version.is_empty() && !name.is_empty() =>
            {
                Ok(Self {
                    name: name.to_string(),
                    version: version.to_string(),
                    build: build.to_string(),
                    kind,
                })
            }
            _ => Err(RegistryError::unsupported(
                artifact,
                "expected `<name>-<version>-<build>` before the extension",
            )),
        }
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conda() {
        let a: ArtifactName = "python-dateutil-2.8.2-pyhd8ed1ab_0.conda".parse().unwrap();
        assert_eq!(a.name, "python-dateutil");
        assert_eq!(a.version, "2.8.2");
        assert_eq!(a.build, "pyhd8ed1ab_0");
        assert_eq!(a.kind, ArtifactKind::Conda);
        assert_eq!(a.stem(), "python-dateutil-2.8.2-pyhd8ed1ab_0");
        assert_eq!(a.to_string(), "python-dateutil-2.8.2-pyhd8ed1ab_0.conda");
    }

    #[test]
    fn test_parse_tar_bz2() {
        let a: ArtifactName = "21cmfast-3.0.2-py36h13dd421_0.tar.bz2".parse().unwrap();
        assert_eq!(a.name, "21cmfast");
        assert_eq!(a.kind, ArtifactKind::TarBz2);
        assert_eq!(a.file_name(), "21cmfast-3.0.2-py36h13dd421_0.tar.bz2");
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let err = "numpy-1.26.4-py312_0.whl".parse::<ArtifactName>().unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedArtifact { .. }));
    }

    #[test]
    fn test_rejects_missing_parts() {
        assert!("numpy-1.26.4.conda".parse::<ArtifactName>().is_err());
        assert!("-1.0-0.conda".parse::<ArtifactName>().is_err());
        assert!(".conda".parse::<ArtifactName>().is_err());
    }
}
