//! Rolldown plugin serving the in-memory entry, virtual modules and imports
//! that live in the site's asset tree.
//!
//! Asset-tree modules get ids in the `ns-kiln:` namespace so diagnostics can
//! tell them apart from `node_modules` code; relative imports made from those
//! modules (or from the in-memory entry) are resolved through the asset tree
//! rather than the filesystem.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use kiln_js::assets::normalize_logical;
use kiln_js::{AssetFs, Loader, NS_IMPORT, STDIN_MARKER, Stdin, resolve_component};
use rolldown_common::{ModuleType, ResolvedExternal};
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs, HookResolveIdOutput,
    HookResolveIdReturn, HookUsage, Plugin, PluginContext,
};

/// Id prefix of virtual modules such as `@params`.
const VIRTUAL_PREFIX: &str = "\0kiln-virtual:";

/// What a module id refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Source {
    Stdin,
    Virtual(String),
    /// A file from the asset tree, by absolute path.
    Asset(String),
}

impl Source {
    fn from_id(id: &str) -> Option<Self> {
        if id == STDIN_MARKER {
            return Some(Source::Stdin);
        }
        if let Some(name) = id.strip_prefix(VIRTUAL_PREFIX) {
            return Some(Source::Virtual(name.to_string()));
        }
        id.strip_prefix(NS_IMPORT)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(|path| Source::Asset(path.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct AssetTreePlugin {
    assets: Arc<dyn AssetFs>,
    stdin: Option<Arc<Stdin>>,
    virtual_modules: Arc<BTreeMap<String, String>>,
}

impl AssetTreePlugin {
    pub fn new(
        assets: Arc<dyn AssetFs>,
        stdin: Option<Stdin>,
        virtual_modules: BTreeMap<String, String>,
    ) -> Self {
        Self {
            assets,
            stdin: stdin.map(Arc::new),
            virtual_modules: Arc::new(virtual_modules),
        }
    }

    /// Resolves `specifier` imported from `importer` to a module id this
    /// plugin serves, or `None` to leave it to Rolldown.
    pub(crate) fn resolve(&self, specifier: &str, importer: Option<&str>) -> Option<String> {
        if specifier == STDIN_MARKER && self.stdin.is_some() {
            return Some(STDIN_MARKER.to_string());
        }
        if self.virtual_modules.contains_key(specifier) {
            return Some(format!("{VIRTUAL_PREFIX}{specifier}"));
        }

        let relative = specifier.starts_with("./") || specifier.starts_with("../");
        let logical = if relative {
            let dir = self.importer_dir(importer?)?;
            normalize_logical(&format!("{dir}/{specifier}"))?
        } else {
            if Path::new(specifier).is_absolute() {
                return None;
            }
            normalize_logical(specifier)?
        };

        let meta = resolve_component(self.assets.as_ref(), &logical).filter(|m| !m.is_dir)?;
        tracing::debug!(specifier, file = %meta.filename.display(), "resolved from asset tree");
        Some(format!("{NS_IMPORT}:{}", meta.filename.display()))
    }

    /// Logical asset-tree directory of an importer this plugin owns.
    fn importer_dir(&self, importer: &str) -> Option<String> {
        match Source::from_id(importer)? {
            Source::Stdin => self.stdin.as_ref().map(|s| s.source_dir.clone()),
            Source::Virtual(_) => None,
            Source::Asset(path) => {
                let parent = Path::new(&path).parent()?;
                let meta = self.assets.stat(&parent.to_string_lossy())?;
                Some(meta.name)
            }
        }
    }

    /// Source text and module type for an id this plugin owns.
    pub(crate) async fn load_source(&self, id: &str) -> anyhow::Result<Option<(String, ModuleType)>> {
        let Some(source) = Source::from_id(id) else {
            return Ok(None);
        };
        match source {
            Source::Stdin => Ok(self
                .stdin
                .as_ref()
                .map(|s| (s.contents.clone(), loader_module_type(s.loader)))),
            Source::Virtual(name) => Ok(self
                .virtual_modules
                .get(&name)
                .map(|code| (code.clone(), ModuleType::Js))),
            Source::Asset(path) => {
                let code = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read asset module: {path}"))?;
                Ok(Some((code, infer_module_type(&path))))
            }
        }
    }
}

impl Plugin for AssetTreePlugin {
    fn name(&self) -> Cow<'static, str> {
        "kiln:asset-tree".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId | HookUsage::Load
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let resolved = self.resolve(args.specifier, args.importer);

        async move {
            Ok(resolved.map(|id| HookResolveIdOutput {
                id: id.into(),
                external: Some(ResolvedExternal::Bool(false)),
                ..Default::default()
            }))
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();
        let plugin = self.clone();

        async move {
            let Some((code, module_type)) = plugin.load_source(&id).await? else {
                return Ok(None);
            };
            Ok(Some(HookLoadOutput {
                code: code.into(),
                module_type: Some(module_type),
                ..Default::default()
            }))
        }
    }
}

fn loader_module_type(loader: Loader) -> ModuleType {
    match loader {
        Loader::Js => ModuleType::Js,
        Loader::Ts => ModuleType::Ts,
        Loader::Jsx => ModuleType::Jsx,
        Loader::Tsx => ModuleType::Tsx,
    }
}

/// Infers module type from file extension
fn infer_module_type(id: &str) -> ModuleType {
    match Path::new(id).extension().and_then(|e| e.to_str()) {
        Some("tsx") => ModuleType::Tsx,
        Some("ts" | "mts" | "cts") => ModuleType::Ts,
        Some("jsx") => ModuleType::Jsx,
        Some("css") => ModuleType::Css,
        Some("json") => ModuleType::Json,
        _ => ModuleType::Js,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_js::{MemoryAssetFs, OsAssetFs};
    use tempfile::TempDir;

    fn plugin(assets: Arc<dyn AssetFs>) -> AssetTreePlugin {
        let stdin = Stdin {
            contents: "import './util';".into(),
            sourcefile: "js/main.ts".into(),
            source_dir: "js".into(),
            loader: Loader::Ts,
            ..Default::default()
        };
        let mut virtual_modules = BTreeMap::new();
        virtual_modules.insert("@params".to_string(), "export default {};\n".to_string());
        AssetTreePlugin::new(assets, Some(stdin), virtual_modules)
    }

    fn memory() -> Arc<dyn AssetFs> {
        Arc::new(
            MemoryAssetFs::new("/site/assets")
                .with_file("js/util.ts", "export {}")
                .with_file("js/lib/index.js", "export {}")
                .with_file("shared/theme.js", "export {}"),
        )
    }

    #[test]
    fn test_infer_module_type() {
        assert!(matches!(infer_module_type("file.js"), ModuleType::Js));
        assert!(matches!(infer_module_type("file.jsx"), ModuleType::Jsx));
        assert!(matches!(infer_module_type("file.ts"), ModuleType::Ts));
        assert!(matches!(infer_module_type("file.tsx"), ModuleType::Tsx));
        assert!(matches!(infer_module_type("file.css"), ModuleType::Css));
        assert!(matches!(infer_module_type("file.json"), ModuleType::Json));
    }

    #[test]
    fn test_stdin_and_virtual_ids() {
        let p = plugin(memory());
        assert_eq!(p.resolve(STDIN_MARKER, None).as_deref(), Some(STDIN_MARKER));
        assert_eq!(
            p.resolve("@params", Some(STDIN_MARKER)),
            Some(format!("{VIRTUAL_PREFIX}@params"))
        );
    }

    #[test]
    fn test_relative_import_from_stdin_uses_source_dir() {
        let p = plugin(memory());
        assert_eq!(
            p.resolve("./util", Some(STDIN_MARKER)).as_deref(),
            Some("ns-kiln:/site/assets/js/util.ts")
        );
        assert_eq!(
            p.resolve("../shared/theme", Some(STDIN_MARKER)).as_deref(),
            Some("ns-kiln:/site/assets/shared/theme.js")
        );
    }

    #[test]
    fn test_relative_import_from_namespaced_module() {
        let p = plugin(memory());
        assert_eq!(
            p.resolve("./lib", Some("ns-kiln:/site/assets/js/util.ts")).as_deref(),
            Some("ns-kiln:/site/assets/js/lib/index.js")
        );
    }

    #[test]
    fn test_bare_asset_path_and_unknown_packages() {
        let p = plugin(memory());
        assert_eq!(
            p.resolve("shared/theme", Some("/real/file.js")).as_deref(),
            Some("ns-kiln:/site/assets/shared/theme.js")
        );
        assert_eq!(p.resolve("react", Some(STDIN_MARKER)), None);
        assert_eq!(p.resolve("./util", Some("/real/file.js")), None);
        assert_eq!(p.resolve("./util", None), None);
    }

    #[tokio::test]
    async fn test_load_sources() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js/util.jsx"), "export const a = <b/>;").unwrap();
        let p = plugin(Arc::new(OsAssetFs::new(dir.path())));

        let (code, module_type) = p.load_source(STDIN_MARKER).await.unwrap().unwrap();
        assert_eq!(code, "import './util';");
        assert!(matches!(module_type, ModuleType::Ts));

        let id = p.resolve("./util", Some(STDIN_MARKER)).unwrap();
        let (code, module_type) = p.load_source(&id).await.unwrap().unwrap();
        assert_eq!(code, "export const a = <b/>;");
        assert!(matches!(module_type, ModuleType::Jsx));

        let virtual_id = format!("{VIRTUAL_PREFIX}@params");
        let (code, _) = p.load_source(&virtual_id).await.unwrap().unwrap();
        assert_eq!(code, "export default {};\n");

        assert!(p.load_source("/node_modules/react/index.js").await.unwrap().is_none());
        assert!(p.load_source("ns-kiln:/missing.js").await.is_err());
    }
}
