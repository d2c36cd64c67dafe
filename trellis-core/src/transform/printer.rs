//! Pseudo-source rendering of an instrumented program.
//!
//! Each statement node prints as a wrapper function registered with its
//! dependencies, followed by the rewritten call site:
//!
//! ```text
//! @atom(name="atom_00002_001_text", dependencies=["atom_00001_001_slider"])
//! def _auto_atom_2(param0):
//!     return text(f"Double is {(param0 * 2)}")
//! _auto_atom_2(n)
//! ```

use std::fmt;

use super::program::{DeclBody, InstrumentedProgram, NodeDecl};
use crate::script::ast::write_block;

fn write_decorator(f: &mut fmt::Formatter<'_>, decl: &NodeDecl) -> fmt::Result {
    let deps: Vec<String> = decl
        .dependencies
        .iter()
        .map(|dep| format!("{:?}", dep.as_str()))
        .collect();
    writeln!(
        f,
        "@atom(name={:?}, dependencies=[{}])",
        decl.id.as_str(),
        deps.join(", ")
    )
}

impl fmt::Display for InstrumentedProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut helper = 0;
        for (i, decl) in self.nodes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write_decorator(f, decl)?;
            match &decl.body {
                DeclBody::Function(def) => {
                    writeln!(f, "def {}({}):", def.name, def.params.join(", "))?;
                    write_block(f, &def.body, 1)?;
                }
                DeclBody::Statement(expr) => {
                    helper += 1;
                    let params: Vec<String> =
                        (0..decl.dependencies.len()).map(|i| format!("param{i}")).collect();
                    writeln!(f, "def _auto_atom_{}({}):", helper, params.join(", "))?;
                    writeln!(f, "    return {}", expr)?;
                    let call = format!("_auto_atom_{}({})", helper, decl.arguments.join(", "));
                    match &decl.binds {
                        Some(target) => writeln!(f, "{} = {}", target, call)?,
                        None => writeln!(f, "{}", call)?,
                    }
                }
            }
        }
        Ok(())
    }
}
