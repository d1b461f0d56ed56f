use clap::ValueEnum;

/// Output format of the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Immediately invoked function expression (script tags)
    Iife,
    /// CommonJS
    Cjs,
    /// ECMAScript modules
    Esm,
}

impl Format {
    /// Token understood by the `format` build option.
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Iife => "iife",
            Format::Cjs => "cjs",
            Format::Esm => "esm",
        }
    }
}

/// How source maps are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceMapMode {
    None,
    /// Embedded in the output as a data URL
    Inline,
    /// Separate .map file without a reference comment
    External,
    /// Separate .map file referenced from the output
    Linked,
}

impl SourceMapMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceMapMode::None => "none",
            SourceMapMode::Inline => "inline",
            SourceMapMode::External => "external",
            SourceMapMode::Linked => "linked",
        }
    }
}
