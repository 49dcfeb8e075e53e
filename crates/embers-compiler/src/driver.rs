/// Compiler driver that orchestrates the compilation pipeline
///
/// scan → generate (inlining includes) → parse the generated program → wrap
/// it in a [`Template`].

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde::Serialize;
use tracing::debug;

use embers_parser::{scan, SegmentKind};

use crate::codegen::{quote, CodeGenerator};
use crate::diagnostics::map_parse_error;
use crate::error::{CompileError, RenderError, Result};
use crate::include::IncludeResolver;
use crate::loader::{
    extension_of, normalize_path, resolve_include_path, AsyncContentLoader, ContentLoader, FsLoader, MemoryLoader,
};
use crate::options::{CompileOptions, TargetMode};
use crate::template::Template;

/// The Embers compiler
///
/// Pairs compile options with the loader used for includes and
/// [`Compiler::render_file`].
#[derive(Debug, Clone)]
pub struct Compiler<L = FsLoader> {
    options: CompileOptions,
    loader: L,
}

impl Compiler<FsLoader> {
    /// A compiler that loads includes from the file system.
    pub fn new(options: CompileOptions) -> Self {
        Self::with_loader(options, FsLoader::new())
    }
}

impl<L: ContentLoader> Compiler<L> {
    pub fn with_loader(options: CompileOptions, loader: L) -> Self {
        Self { options, loader }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn compile(&self, source: &str) -> Result<Template> {
        compile_with(source, &self.options, &self.loader)
    }

    pub fn render<S: Serialize + ?Sized>(&self, source: &str, locals: &S) -> std::result::Result<String, RenderError> {
        Ok(self.compile(source)?.render(locals)?)
    }

    /// Load `path` through the loader and render it with `filename = path`.
    pub fn render_file<S: Serialize + ?Sized>(&self, path: &str, locals: &S) -> std::result::Result<String, RenderError> {
        let source = self.loader.load(path).map_err(CompileError::Load)?;
        let options = self.options.clone().filename(path);
        Ok(compile_with(&source, &options, &self.loader)?.render(locals)?)
    }
}

/// Compile `source`, loading includes from the file system.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Template> {
    compile_with(source, options, &FsLoader::new())
}

/// Compile and render in one step.
pub fn render<S: Serialize + ?Sized>(
    source: &str,
    options: &CompileOptions,
    locals: &S,
) -> std::result::Result<String, RenderError> {
    Ok(compile(source, options)?.render(locals)?)
}

/// Read `path` from the file system and render it.
pub fn render_file<S: Serialize + ?Sized>(
    path: &str,
    options: &CompileOptions,
    locals: &S,
) -> std::result::Result<String, RenderError> {
    Compiler::new(options.clone()).render_file(path, locals)
}

/// Compile `source` with an explicit loader.
pub fn compile_with(source: &str, options: &CompileOptions, loader: &dyn ContentLoader) -> Result<Template> {
    options.validate()?;
    debug!(
        filename = ?options.filename,
        debug = options.compile_debug,
        target = ?options.target,
        "compiling template"
    );

    let filters = options.filter_registry();
    let resolver = IncludeResolver::new(loader, options.template_extension.clone());
    let generated = CodeGenerator::new(options, &filters, resolver).generate(source)?;

    let mut code = generated.code;
    let mut line_table = generated.line_table;

    // Portable units carry their own sources for diagnostics
    if options.target == TargetMode::Portable && options.compile_debug {
        let mut prelude = String::new();
        for (path, text) in &generated.sources {
            let path = path.as_deref().map(quote).unwrap_or_else(|| "null".to_string());
            prelude.push_str(&format!("__source({path}, {})\n", quote(text)));
        }
        if let Some(table) = line_table.as_mut() {
            table.offset(generated.sources.len());
        }
        code = prelude + &code;
    }

    let program = embers_parser::parse(&code)
        .map_err(|e| map_parse_error(e, line_table.as_ref(), options.filename.as_deref()))?;

    debug!(
        bytes = code.len(),
        statements = program.statements.len(),
        "generated program"
    );

    let sources = match options.target {
        TargetMode::Server => generated.sources,
        TargetMode::Portable => Default::default(),
    };
    Ok(Template::new(program, code, options, sources))
}

/// Compile `source`, fetching includes through an async loader.
///
/// The include tree is loaded first, siblings concurrently, then compiled
/// synchronously from memory.
pub async fn compile_async<L: AsyncContentLoader>(source: &str, options: &CompileOptions, loader: &L) -> Result<Template> {
    options.validate()?;
    let file = options.filename.as_deref().map(normalize_path);
    let chain: Vec<String> = file.iter().cloned().collect();
    let fetched = prefetch(loader, options, source.to_string(), file, chain).await?;
    debug!(includes = fetched.len(), "prefetched include tree");

    let memory: MemoryLoader = fetched.into_iter().collect();
    compile_with(source, options, &memory)
}

pub async fn render_async<L: AsyncContentLoader, S: Serialize + ?Sized>(
    source: &str,
    options: &CompileOptions,
    loader: &L,
    locals: &S,
) -> std::result::Result<String, RenderError> {
    Ok(compile_async(source, options, loader).await?.render(locals)?)
}

pub async fn render_file_async<L: AsyncContentLoader, S: Serialize + ?Sized>(
    path: &str,
    options: &CompileOptions,
    loader: &L,
    locals: &S,
) -> std::result::Result<String, RenderError> {
    let source = loader.load(path).await.map_err(CompileError::Load)?;
    let options = options.clone().filename(path);
    render_async(&source, &options, loader, locals).await
}

/// Load every include reachable from `text`, returning `(path, text)` pairs.
///
/// Templates that fail to scan, includes without a source path and cycles
/// are skipped here; compiling from the fetched set reports them.
fn prefetch<'a, L: AsyncContentLoader>(
    loader: &'a L,
    options: &'a CompileOptions,
    text: String,
    file: Option<String>,
    chain: Vec<String>,
) -> BoxFuture<'a, Result<Vec<(String, String)>>> {
    async move {
        let Some(caller) = file else {
            return Ok(Vec::new());
        };
        let Ok(segments) = scan(&text, &options.delimiters()) else {
            return Ok(Vec::new());
        };

        let mut targets: Vec<(String, bool)> = Vec::new();
        for segment in segments {
            if let SegmentKind::Include(directive) = segment.kind {
                let path = resolve_include_path(&caller, &directive.path, &options.template_extension);
                let raw = directive.raw || extension_of(&path) != Some(options.template_extension.as_str());
                let cyclic = !raw && chain.contains(&path);
                if !cyclic && !targets.iter().any(|(p, _)| p == &path) {
                    targets.push((path, raw));
                }
            }
        }

        let loads = targets.into_iter().map(|(path, raw)| {
            let caller = caller.clone();
            let mut chain = chain.clone();
            async move {
                let text = loader
                    .load(&path)
                    .await
                    .map_err(|source| CompileError::IncludeNotFound {
                        path: path.clone(),
                        from: caller,
                        source,
                    })?;

                let mut fetched = Vec::new();
                if !raw {
                    chain.push(path.clone());
                    fetched = prefetch(loader, options, text.clone(), Some(path.clone()), chain).await?;
                }
                fetched.push((path, text));
                Ok::<_, CompileError>(fetched)
            }
        });

        let nested = try_join_all(loads).await?;
        Ok(nested.into_iter().flatten().collect())
    }
    .boxed()
}
