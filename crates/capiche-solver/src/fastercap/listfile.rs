//! FasterCap 2D list-file writer.
//!
//! The whole geometry goes into a single list file with the panel groups
//! inlined as `File ... End` sections. Each conductor contributes one
//! group per facing permittivity, joined with `+` so FasterCap treats them
//! as one conductor. Each dielectric interface panel is its own group, with
//! a reference point on its outer side.

use std::fmt::Write;

use capiche_geometry::{GeometryInstance, Panel, PanelKind};

/// Distance of a dielectric reference point from its panel, relative to
/// the panel length.
const REFERENCE_OFFSET: f64 = 0.25;

/// Render a geometry as a FasterCap list file.
pub fn write_list_file(geometry: &GeometryInstance) -> String {
    let mut out = String::new();
    let mut sections = String::new();

    let _ = writeln!(out, "* {}", geometry.topology());
    let _ = writeln!(out, "* conductors: {}", geometry.conductors().join(" "));

    for (index, name) in geometry.conductors().iter().enumerate() {
        // group this conductor's panels by facing permittivity, keeping
        // first-seen order
        let mut groups: Vec<(f64, Vec<&Panel>)> = Vec::new();
        for panel in geometry.conductor_panels(index) {
            if let PanelKind::Conductor { permittivity, .. } = panel.kind {
                match groups.iter_mut().find(|(k, _)| *k == permittivity) {
                    Some((_, panels)) => panels.push(panel),
                    None => groups.push((permittivity, vec![panel])),
                }
            }
        }

        let count = groups.len();
        for (group, (permittivity, panels)) in groups.into_iter().enumerate() {
            let file = format!("{}_{}.txt", name, group);
            let join = if group + 1 < count { " +" } else { "" };
            let _ = writeln!(out, "C {} {} 0.0 0.0{}", file, number(permittivity), join);
            write_section(&mut sections, &file, name, &panels);
        }
    }

    for (index, panel) in geometry.interface_panels().enumerate() {
        if let PanelKind::Interface { outer, inner } = panel.kind {
            let file = format!("interface_{}.txt", index);
            let reference = panel.left_point(REFERENCE_OFFSET * panel.length());
            let _ = writeln!(
                out,
                "D {} {} {} 0.0 0.0 {} {}",
                file,
                number(outer),
                number(inner),
                number(reference.x),
                number(reference.y)
            );
            write_section(&mut sections, &file, "interface", &[panel]);
        }
    }

    out.push('\n');
    out.push_str(&sections);
    out
}

fn write_section(out: &mut String, file: &str, name: &str, panels: &[&Panel]) {
    let _ = writeln!(out, "File {}", file);
    for panel in panels {
        let _ = writeln!(
            out,
            "S {} {} {} {} {}",
            name,
            number(panel.start.x),
            number(panel.start.y),
            number(panel.end.x),
            number(panel.end.y)
        );
    }
    let _ = writeln!(out, "End");
}

/// Shortest exact decimal form, with `-0` normalised.
fn number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{}", value)
    }
}
