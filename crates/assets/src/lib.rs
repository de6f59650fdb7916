//! Embedded assets: the built-in script set and the `@boop/` lib modules.
//!
//! Everything here is compiled into the binary. The loader and the module
//! registry see the tree through the [`ScriptAssets`] trait so tests can
//! substitute their own file sets.
//!
//! Layout convention: scripts live at the root of the tree, shared JS module
//! code lives under `lib/` and is never loaded as a script.

/// A single embedded file. Paths are relative to the scripts root and use
/// `/` separators (e.g. `"Trim.js"`, `"lib/case.js"`).
#[derive(Debug, Clone, Copy)]
pub struct AssetFile {
    pub path: &'static str,
    pub contents: &'static str,
}

/// Read-only view over a script asset tree.
pub trait ScriptAssets {
    /// Every file in the tree, in a stable order.
    fn files(&self) -> &[AssetFile];

    /// Contents of the file at `path`, if present.
    fn read(&self, path: &str) -> Option<&str> {
        self.files()
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.contents)
    }
}

/// Directory name reserved for `@boop/` module code.
pub const LIB_DIR: &str = "lib";

static SCRIPTS: &[AssetFile] = &[
    AssetFile { path: "Base64Decode.js", contents: include_str!("../scripts/Base64Decode.js") },
    AssetFile { path: "Base64Encode.js", contents: include_str!("../scripts/Base64Encode.js") },
    AssetFile { path: "CamelCase.js", contents: include_str!("../scripts/CamelCase.js") },
    AssetFile { path: "CountLines.js", contents: include_str!("../scripts/CountLines.js") },
    AssetFile { path: "FormatJSON.js", contents: include_str!("../scripts/FormatJSON.js") },
    AssetFile { path: "JSONtoYAML.js", contents: include_str!("../scripts/JSONtoYAML.js") },
    AssetFile { path: "JoinLines.js", contents: include_str!("../scripts/JoinLines.js") },
    AssetFile { path: "KebabCase.js", contents: include_str!("../scripts/KebabCase.js") },
    AssetFile { path: "MinifyJSON.js", contents: include_str!("../scripts/MinifyJSON.js") },
    AssetFile { path: "ReverseLines.js", contents: include_str!("../scripts/ReverseLines.js") },
    AssetFile { path: "SortLines.js", contents: include_str!("../scripts/SortLines.js") },
    AssetFile { path: "Trim.js", contents: include_str!("../scripts/Trim.js") },
    AssetFile { path: "URLDecode.js", contents: include_str!("../scripts/URLDecode.js") },
    AssetFile { path: "URLEncode.js", contents: include_str!("../scripts/URLEncode.js") },
    AssetFile { path: "YAMLtoJSON.js", contents: include_str!("../scripts/YAMLtoJSON.js") },
    AssetFile { path: "lib/case.js", contents: include_str!("../scripts/lib/case.js") },
];

/// The compiled-in script tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAssets;

impl ScriptAssets for EmbeddedAssets {
    fn files(&self) -> &[AssetFile] {
        SCRIPTS
    }
}

/// Contents of the embedded `lib/<name>.js` module file, if shipped.
/// `name` is the bare module name (`case`, not `lib/case.js`).
pub fn lib_module(name: &str) -> Option<&'static str> {
    let path = format!("{LIB_DIR}/{name}.js");
    SCRIPTS.iter().find(|f| f.path == path).map(|f| f.contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_script_has_header() {
        for file in EmbeddedAssets.files() {
            if file.path.starts_with("lib/") {
                continue;
            }
            assert!(
                file.contents.starts_with("/**!"),
                "{} is missing its metadata header",
                file.path
            );
        }
    }

    #[test]
    fn test_read_by_path() {
        let trim = EmbeddedAssets.read("Trim.js").unwrap();
        assert!(trim.contains("@name"));
        assert!(EmbeddedAssets.read("NoSuch.js").is_none());
    }

    #[test]
    fn test_lib_module_lookup() {
        assert!(lib_module("case").is_some());
        assert!(lib_module("case").unwrap().contains("module.exports"));
        assert!(lib_module("lodash").is_none());
    }

    #[test]
    fn test_paths_are_stable_and_unique() {
        let files = EmbeddedAssets.files();
        for pair in files.windows(2) {
            assert!(pair[0].path < pair[1].path, "table must stay sorted");
        }
    }
}
