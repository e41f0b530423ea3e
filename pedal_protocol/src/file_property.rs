use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileType {
    pub label: String,
    #[serde(default)]
    pub mime_type: String,
    /// Includes the leading dot, e.g. `.wav`.
    pub file_extension: String,
}

/// A plugin parameter whose value is a file path, stored as a patch property.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileProperty {
    pub name: String,
    pub patch_property: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub file_types: Vec<FileType>,
}

impl FileProperty {
    pub fn is_valid_extension(&self, extension: &str) -> bool {
        if self.file_types.is_empty() {
            return true;
        }
        let extension = extension.trim_start_matches('.');
        self.file_types.iter().any(|t| {
            t.file_extension
                .trim_start_matches('.')
                .eq_ignore_ascii_case(extension)
        })
    }

    /// A single relative path component.
    pub fn is_directory_name_valid(directory: &str) -> bool {
        !directory.is_empty()
            && directory != "."
            && directory != ".."
            && !directory.contains(['/', '\\'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter() {
        let mut prop = FileProperty {
            name: "Impulse".to_string(),
            patch_property: "urn:cab#impulseFile".to_string(),
            directory: "ReverbImpulseFiles".to_string(),
            file_types: Vec::new(),
        };
        assert!(prop.is_valid_extension(".flac"));

        prop.file_types.push(FileType {
            label: "WAV".to_string(),
            mime_type: "audio/wav".to_string(),
            file_extension: ".wav".to_string(),
        });
        assert!(prop.is_valid_extension(".WAV"));
        assert!(prop.is_valid_extension("wav"));
        assert!(!prop.is_valid_extension(".flac"));
    }

    #[test]
    fn directory_names() {
        assert!(FileProperty::is_directory_name_valid("ReverbImpulseFiles"));
        assert!(!FileProperty::is_directory_name_valid("../etc"));
        assert!(!FileProperty::is_directory_name_valid(".."));
        assert!(!FileProperty::is_directory_name_valid(""));
    }
}
