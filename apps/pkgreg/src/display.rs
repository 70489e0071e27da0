//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};
use pkgreg_types::{
    Checksum, CreatePackageResponse, DeletePackageResponse, DownloadDescriptor,
    ListPackagesResponse,
};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

/// Result of a CLI command
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CommandOutput {
    Created(CreatePackageResponse),
    Package(DownloadDescriptor),
    Packages(ListPackagesResponse),
    Deleted(DeletePackageResponse),
    Fetched {
        path: PathBuf,
        size: u64,
        checksum: Checksum,
    },
    Swept {
        reclaimed: usize,
    },
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
    colors: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self {
            json_output,
            colors: Term::stdout().features().colors_supported(),
        }
    }

    /// Render a command result to stdout
    pub fn render(&self, output: &CommandOutput) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(output).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match output {
            CommandOutput::Created(created) => {
                println!(
                    "{} {}",
                    self.style(Style::new().green().bold(), "Uploaded"),
                    created.identity
                );
                println!("  Size:     {} bytes", created.size);
                println!("  Checksum: {}", created.checksum);
            }
            CommandOutput::Package(descriptor) => self.render_descriptor(descriptor),
            CommandOutput::Packages(list) => self.render_list(list),
            CommandOutput::Deleted(response) => self.render_deleted(response),
            CommandOutput::Fetched {
                path,
                size,
                checksum,
            } => {
                println!(
                    "{} {} ({size} bytes)",
                    self.style(Style::new().green().bold(), "Fetched"),
                    path.display()
                );
                println!("  Checksum: {checksum}");
            }
            CommandOutput::Swept { reclaimed } => {
                println!("Reclaimed {reclaimed} abandoned upload(s)");
            }
        }
        Ok(())
    }

    fn render_descriptor(&self, descriptor: &DownloadDescriptor) {
        let record = &descriptor.record;
        println!("{}", self.style(Style::new().cyan().bold(), &record.identity.to_string()));
        println!();
        println!("Record:   {}", record.id);
        println!("Size:     {} bytes", record.size);
        if let Some(checksum) = &record.checksum {
            println!("Checksum: {checksum}");
        }
        println!("Created:  {}", record.created_at.to_rfc3339());
        println!("Location: {}", record.location);
        if let Some(url) = &descriptor.url {
            println!("URL:      {}", url.url);
            println!("Expires:  {}", url.expires_at.to_rfc3339());
        }
    }

    fn render_list(&self, list: &ListPackagesResponse) {
        if list.packages.is_empty() {
            println!("No packages found.");
            return;
        }

        let with_urls = list.packages.iter().any(|d| d.url.is_some());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        let mut header = vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Type").add_attribute(Attribute::Bold),
            Cell::new("Size").add_attribute(Attribute::Bold),
            Cell::new("Created").add_attribute(Attribute::Bold),
        ];
        if with_urls {
            header.push(Cell::new("URL").add_attribute(Attribute::Bold));
        }
        table.set_header(header);

        for descriptor in &list.packages {
            let record = &descriptor.record;
            let mut row = vec![
                Cell::new(&record.identity.name),
                Cell::new(&record.identity.version),
                Cell::new(record.identity.package_type.as_str()),
                Cell::new(format_size(record.size)),
                Cell::new(record.created_at.format("%Y-%m-%d %H:%M:%S")),
            ];
            if with_urls {
                row.push(Cell::new(
                    descriptor.url.as_ref().map_or("-", |url| url.url.as_str()),
                ));
            }
            table.add_row(row);
        }

        println!("{table}");
    }

    fn render_deleted(&self, response: &DeletePackageResponse) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("Outcome").add_attribute(Attribute::Bold),
        ]);

        for outcome in &response.results {
            let cell = match &outcome.result {
                Ok(()) => Cell::new("deleted").fg(Color::Green),
                Err(err) => Cell::new(format!("{}: {err}", err.kind())).fg(Color::Red),
            };
            table.add_row(vec![Cell::new(outcome.identity.to_string()), cell]);
        }

        println!("{table}");
    }

    fn style(&self, style: Style, text: &str) -> String {
        if self.colors {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut unit = 0;
    let mut whole = bytes;
    let mut rem = 0;
    while whole >= 1024 && unit < UNITS.len() - 1 {
        rem = whole % 1024;
        whole /= 1024;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{whole}.{} {}", rem * 10 / 1024, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KiB");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
