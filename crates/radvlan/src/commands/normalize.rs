//! `radvlan normalize`: canonicalize MAC addresses offline.

use serde::Serialize;

use radvlan_core::{MacAddress, MacPrefix};

use crate::cli::{GlobalOpts, NormalizeArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Normalized {
    input: String,
    mac: Option<MacAddress>,
    prefix: Option<MacPrefix>,
}

fn normalize_all(inputs: &[String]) -> Vec<Normalized> {
    inputs
        .iter()
        .map(|input| {
            let mac = MacAddress::normalize(input).ok();
            Normalized {
                input: input.clone(),
                prefix: mac.as_ref().map(MacAddress::prefix),
                mac,
            }
        })
        .collect()
}

fn render_text(rows: &[Normalized]) -> String {
    rows.iter()
        .map(|row| match &row.mac {
            Some(mac) => mac.to_string(),
            None => format!("{}: invalid", row.input),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints every input, then fails with the first invalid one.
pub fn handle(args: &NormalizeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let rows = normalize_all(&args.macs);
    let out = output::render(global.output, rows.as_slice(), render_text)?;
    output::print_output(&out, global.quiet)?;

    match rows.iter().find(|row| row.mac.is_none()) {
        Some(bad) => Err(CliError::InvalidMac {
            raw: bad.input.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mixed_inputs_keep_order_and_flag_invalid() {
        let rows = normalize_all(&[
            "aa-bb-cc-dd-ee-ff".to_owned(),
            "nope".to_owned(),
            "aabb.ccdd.eeff".to_owned(),
        ]);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].mac.as_ref().unwrap().as_str(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(rows[0].prefix.as_ref().unwrap().as_str(), "aa:bb:cc");
        assert!(rows[1].mac.is_none());
        assert!(rows[1].prefix.is_none());
        assert_eq!(rows[2].mac, rows[0].mac);

        assert_eq!(
            render_text(&rows),
            "aa:bb:cc:dd:ee:ff\nnope: invalid\naa:bb:cc:dd:ee:ff"
        );
    }
}
