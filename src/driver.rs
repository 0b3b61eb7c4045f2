//! Driver synthesis.
//!
//! A driver is a standalone `package main` program holding every helper
//! declaration visible from the call site, plus a `main` that performs one
//! call and prints its first result in canonical Go literal form:
//!
//! - strings are quoted with `strconv.Quote`
//! - integers print in decimal, signed and unsigned alike
//! - floats print in shortest round-trip form and always carry a `.` or exponent
//! - booleans print as `true`/`false`
//! - anything else prints with `%#v`

use std::collections::{BTreeMap, HashSet};

use crate::analysis::{Declaration, DeclarationKind};
use crate::project::{HelperFile, ImportSpec, ProjectContext, Target};
use crate::report::debug;

/// File name of the driver inside the scratch directory.
pub const DRIVER_FILE: &str = "main.go";

/// Import aliases used by the driver's own code. Helper code cannot collide
/// with these.
const RESERVED_IMPORTS: &[(&str, &str)] = &[
    ("__goaheadFmt", "fmt"),
    ("__goaheadOs", "os"),
    ("__goaheadReflect", "reflect"),
    ("__goaheadStrconv", "strconv"),
];

/// Alias given to the target package when a helper import already uses its name.
const TARGET_ALIAS: &str = "__goaheadTarget";

const RUNTIME: &str = r#"func __goaheadFirst[T any](value T, _ ...any) T {
	return value
}

func __goaheadPrint(value any) {
	rv := __goaheadReflect.ValueOf(value)
	switch rv.Kind() {
	case __goaheadReflect.String:
		__goaheadFmt.Print(__goaheadStrconv.Quote(rv.String()))
	case __goaheadReflect.Bool:
		__goaheadFmt.Print(rv.Bool())
	case __goaheadReflect.Int, __goaheadReflect.Int8, __goaheadReflect.Int16, __goaheadReflect.Int32, __goaheadReflect.Int64:
		__goaheadFmt.Print(__goaheadStrconv.FormatInt(rv.Int(), 10))
	case __goaheadReflect.Uint, __goaheadReflect.Uint8, __goaheadReflect.Uint16, __goaheadReflect.Uint32, __goaheadReflect.Uint64, __goaheadReflect.Uintptr:
		__goaheadFmt.Print(__goaheadStrconv.FormatUint(rv.Uint(), 10))
	case __goaheadReflect.Float32, __goaheadReflect.Float64:
		__goaheadFmt.Print(__goaheadFloat(__goaheadStrconv.FormatFloat(rv.Float(), 'f', -1, rv.Type().Bits())))
	default:
		__goaheadFmt.Printf("%#v", value)
	}
}

func __goaheadFloat(s string) string {
	for _, c := range s {
		if c == '.' || c == 'e' || c == 'E' || c == 'I' || c == 'N' {
			return s
		}
	}
	return s + ".0"
}
"#;

/// A synthesized driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverProgram {
    pub source: String,
    /// The call expression `main` evaluates.
    pub call: String,
}

/// Build the driver calling `target` with already-rendered `args`, using the
/// helpers visible at `depth`.
pub fn synthesize(ctx: &ProjectContext, target: &Target, depth: usize, args: &[String]) -> DriverProgram {
    let kept = kept_declarations(ctx.visible_helpers(depth));

    let mut imports: BTreeMap<String, ImportSpec> = BTreeMap::new();
    for (file, decl) in &kept {
        for qualifier in &decl.qualifiers {
            let Some(import) = file.source.import_named(qualifier) else {
                continue;
            };
            let spec = ImportSpec {
                alias: import.alias.clone(),
                path: import.path.clone(),
            };
            add_import(&mut imports, qualifier, spec);
        }
        for import in &file.source.imports {
            if import.alias.as_deref() == Some("_") {
                imports.insert(format!("_ {}", import.path), ImportSpec {
                    alias: Some("_".to_string()),
                    path: import.path.clone(),
                });
            }
        }
    }

    let callee = match target {
        Target::Helper(sym) => sym.name.clone(),
        Target::Qualified { qualifier, member } => format!("{}.{}", qualifier, member),
        Target::Package { import, member } => {
            let local = import.local_name();
            match imports.get(&local) {
                Some(existing) if existing.path != import.path => {
                    imports.insert(TARGET_ALIAS.to_string(), ImportSpec {
                        alias: Some(TARGET_ALIAS.to_string()),
                        path: import.path.clone(),
                    });
                    format!("{}.{}", TARGET_ALIAS, member)
                }
                _ => {
                    imports.insert(local.clone(), import.clone());
                    format!("{}.{}", local, member)
                }
            }
        }
    };
    let call = format!("{}({})", callee, args.join(", "));

    let mut source = String::from("// Code generated by goahead. DO NOT EDIT.\n\npackage main\n\nimport (\n");
    for (alias, path) in RESERVED_IMPORTS {
        source.push_str(&format!("\t{} {:?}\n", alias, path));
    }
    for spec in imports.values() {
        source.push_str(&format!("\t{}\n", spec.to_spec()));
    }
    source.push_str(")\n\n");

    for (_, decl) in &kept {
        if let Some(doc) = &decl.doc {
            source.push_str(doc);
            source.push('\n');
        }
        source.push_str(&decl.text);
        source.push_str("\n\n");
    }

    source.push_str(RUNTIME);
    source.push_str(&format!(
        "\nfunc main() {{\n\t__goaheadPrint(__goaheadFirst({}))\n\t__goaheadOs.Exit(0)\n}}\n",
        call
    ));

    debug(format!("driver for {} uses {} declarations", call, kept.len()));
    DriverProgram { source, call }
}

/// Declarations to copy into the driver, with the file each comes from.
///
/// Files arrive deepest first, so the first declaration seen for a name wins
/// and shallower ones are dropped. `main` is always dropped; the driver
/// brings its own. `init` functions may repeat and are all kept.
fn kept_declarations<'a>(files: impl Iterator<Item = &'a HelperFile>) -> Vec<(&'a HelperFile, &'a Declaration)> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();

    for file in files {
        for decl in &file.source.declarations {
            if decl.kind == DeclarationKind::Function {
                match decl.name() {
                    "main" => continue,
                    "init" => {
                        kept.push((file, decl));
                        continue;
                    }
                    _ => {}
                }
            }
            let keys = decl.shadow_keys();
            if keys.iter().any(|k| seen.contains(k)) {
                debug(format!("{} is shadowed; skipping {}", keys.join(", "), file.path.display()));
                continue;
            }
            seen.extend(keys);
            kept.push((file, decl));
        }
    }

    kept
}

fn add_import(imports: &mut BTreeMap<String, ImportSpec>, local: &str, spec: ImportSpec) {
    match imports.get(local) {
        Some(existing) if existing.path != spec.path => {
            debug(format!(
                "import name {} is used for both {} and {}; keeping the first",
                local, existing.path, spec.path
            ));
        }
        Some(_) => {}
        None => {
            imports.insert(local.to_string(), spec);
        }
    }
}
