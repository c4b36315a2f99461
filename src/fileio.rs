//! Code regarding file input (enumerating source `.jack` files)
//! and output (writing generated `.vm` files) actions.
//!
//! `.vm` files land next to their sources: `Foo.jack` becomes `Foo.vm`
//! in the same directory.

pub mod input {
    use std::{
        fs, io,
        path::{Path, PathBuf},
    };

    /// All `.jack` files directly inside `dir`, in name order.
    /// The walk is deliberately non-recursive.
    pub fn jack_sources(dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut sources = Vec::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "jack") {
                sources.push(path);
            }
        }

        sources.sort();
        Ok(sources)
    }
}

pub mod output {
    use std::{
        fs, io,
        path::{Path, PathBuf},
    };

    /// Write the compiled VM text next to its source file,
    /// returning the path it landed at.
    pub fn generate(source_path: &Path, content: &str) -> io::Result<PathBuf> {
        let output_path = source_path.with_extension("vm");
        fs::write(&output_path, content)?;

        Ok(output_path)
    }
}
