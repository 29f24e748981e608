//! Plain-text symbol listings and bulk edits
//!
//! The import format is what BSD `nm` prints: `ADDR [TYPE] NAME`, one
//! symbol per line, address in hex. Export writes `ADDR NAME`, so symbol
//! types do not survive a round trip.

use std::io::{BufRead, Write};

use regex::Regex;

use super::{
    symbols::{SymbolName, SymbolTable},
    Address,
};
use crate::prelude::{Error, FdResult};

fn parse_address(text: &str) -> Option<Address> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    Address::from_str_radix(digits, 16).ok()
}

/// Read every symbol of a listing without touching any table
pub fn parse_listing(reader: impl BufRead) -> FdResult<Vec<(String, Address)>> {
    let mut symbols = vec![];

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let bad = || Error::BadListing {
            line: index + 1,
            text: text.to_owned(),
        };

        let fields: Vec<&str> = text.split_whitespace().collect();
        let (address, name) = match fields.as_slice() {
            // nm prints undefined and weak symbols with no address
            [kind, _] if parse_address(kind).is_none() && matches!(*kind, "U" | "w" | "v") => {
                log::debug!("skipping undefined symbol: {}", text);
                continue;
            }
            [address, name] | [address, _, name] => (*address, *name),
            _ => return Err(bad()),
        };

        symbols.push((name.to_owned(), parse_address(address).ok_or_else(bad)?));
    }

    Ok(symbols)
}

/// Load a listing into `stab`. With `replace` the table is cleared first,
/// otherwise the listing is merged over what is already there.
///
/// The whole listing is parsed before the table changes, so a malformed
/// line leaves the table as it was.
pub fn import(stab: &mut SymbolTable, reader: impl BufRead, replace: bool) -> FdResult<usize> {
    let symbols = parse_listing(reader)?;

    if replace {
        stab.clear();
    }
    for (name, address) in &symbols {
        log::debug!("import: {} = 0x{:04x}", name, address);
        stab.set(name, *address)?;
    }

    log::info!("imported {} symbols", symbols.len());
    Ok(symbols.len())
}

/// Write every symbol in address order, one `ADDR NAME` line each
pub fn export(stab: &SymbolTable, writer: &mut impl Write) -> FdResult<usize> {
    let mut count = 0;
    stab.enumerate(|name, address| {
        writeln!(writer, "{:08x} {}", address, name)?;
        count += 1;
        Ok(())
    })?;
    writer.flush()?;

    log::info!("exported {} symbols", count);
    Ok(count)
}

/// Symbols whose name matches `pattern`, in address order.
/// Without a pattern every symbol is returned.
pub fn find(stab: &SymbolTable, pattern: Option<&Regex>) -> FdResult<Vec<(String, Address)>> {
    let mut found = vec![];
    stab.enumerate(|name, address| {
        if pattern.map_or(true, |re| re.is_match(name)) {
            found.push((name.to_owned(), address));
        }
        Ok(())
    })?;
    Ok(found)
}

/// Replace the first match of `pattern` in every symbol name with
/// `replacement` (`$1` style group references allowed). Each rename is a
/// delete of the old name followed by a set of the new one at the same
/// address. Returns the `(old, new)` pairs that changed.
///
/// A replacement that yields an invalid name stops the walk before that
/// symbol is touched; renames already made are kept.
pub fn rename(
    stab: &mut SymbolTable,
    pattern: &Regex,
    replacement: &str,
) -> FdResult<Vec<(String, String)>> {
    let mut renamed = vec![];

    for (name, address) in find(stab, Some(pattern))? {
        let new_name = pattern.replace(&name, replacement).into_owned();
        if new_name == name {
            continue;
        }

        SymbolName::check(&new_name)?;
        log::debug!("rename: {} -> {}", name, new_name);
        stab.delete(&name)?;
        stab.set(&new_name, address)?;
        renamed.push((name, new_name));
    }

    Ok(renamed)
}
