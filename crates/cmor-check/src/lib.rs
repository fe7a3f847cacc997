//! Compliance checking of climate cubes against CMOR variable
//! specifications.
//!
//! [`CmorChecker`] is the validation engine; [`checker_for`] resolves a
//! specification from a table registry and yields a checker constructor; the
//! free functions [`check_metadata`], [`check_data`] and [`check`] are the
//! fail-fast convenience entry points used by preprocessing pipelines.

pub mod checker;
pub mod error;
pub mod frequency;

pub use checker::CmorChecker;
pub use error::CheckError;
pub use frequency::Frequency;

use cmor_model::Cube;
use cmor_tables::TableRegistry;

/// Resolve a variable specification and return a checker constructor.
///
/// The variable is looked up in `table`, falling back to the custom table
/// when the primary one has no entry. An unknown `table` fails immediately,
/// listing the registered ones.
pub fn checker_for<'a>(
    registry: &'a TableRegistry,
    table: &str,
    mip: &str,
    short_name: &str,
    frequency: Option<&str>,
    fail_on_error: bool,
    automatic_fixes: bool,
) -> Result<impl Fn(Cube) -> CmorChecker<'a> + use<'a>, CheckError> {
    if !registry.contains(table) {
        return Err(CheckError::UnknownTable {
            table: table.to_string(),
            known: registry.known_tables().join(", "),
        });
    }
    let var_spec = registry.resolve_variable(table, mip, short_name)?;
    let frequency = frequency.map(str::to_string);
    Ok(move |cube: Cube| {
        let mut checker = CmorChecker::new(cube, var_spec)
            .with_fail_on_error(fail_on_error)
            .with_automatic_fixes(automatic_fixes);
        if let Some(token) = frequency.as_deref() {
            checker = checker.with_frequency(token);
        }
        checker
    })
}

/// Check cube metadata against a variable's specification, failing on the
/// first error and applying no fixes. Returns the cube on success.
pub fn check_metadata(
    cube: Cube,
    registry: &TableRegistry,
    table: &str,
    mip: &str,
    short_name: &str,
    frequency: Option<&str>,
) -> Result<Cube, CheckError> {
    let constructor = checker_for(registry, table, mip, short_name, frequency, true, false)?;
    let mut checker = constructor(cube);
    checker.check_metadata()?;
    Ok(checker.into_cube())
}

/// Check cube data against a variable's specification, failing on the first
/// error and applying no fixes. Assumes the metadata was already checked.
pub fn check_data(
    cube: Cube,
    registry: &TableRegistry,
    table: &str,
    mip: &str,
    short_name: &str,
    frequency: Option<&str>,
) -> Result<Cube, CheckError> {
    let constructor = checker_for(registry, table, mip, short_name, frequency, true, false)?;
    let mut checker = constructor(cube);
    checker.check_data()?;
    Ok(checker.into_cube())
}

/// Run the metadata check and then the data check.
pub fn check(
    cube: Cube,
    registry: &TableRegistry,
    table: &str,
    mip: &str,
    short_name: &str,
    frequency: Option<&str>,
) -> Result<Cube, CheckError> {
    let cube = check_metadata(cube, registry, table, mip, short_name, frequency)?;
    check_data(cube, registry, table, mip, short_name, frequency)
}
