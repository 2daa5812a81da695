//! Build automation tasks for sstload
//!
//! Currently generates the csv2sstable CLI reference from the clap
//! definitions so the docs cannot drift from the binary.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for sstload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the csv2sstable CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<sstload_ingest::Cli>();

    let content = format!(
        r#"# csv2sstable Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

`csv2sstable` reads a delimited text file line by line, converts the mapped
fields to the column types of a CQL `CREATE TABLE` statement, and writes the
rows under `<output>/<keyspace>/<table>`.

## Quick Start

```bash
csv2sstable \
  --cql "CREATE TABLE ks.events (id int PRIMARY KEY, tags list<text>, seen timestamp)" \
  --mapping "id:0,tags:1,seen:2" \
  --csv events.csv \
  --output ./output \
  --delimiter , --list-delimiter :
```

## Options

{}

## Type Conversion

| Column type | Field text | Empty field |
|-------------|------------|-------------|
| `int`, `bigint`, `varint` | decimal integer | null |
| `float`, `double` | decimal or exponent notation | null |
| `timestamp` | `yyyy-MM-dd HH:mm:ss`, null if unparsable | null |
| `list<..>`, `set<..>` | members split on the list delimiter | null |
| `map<text, double>` | `{{k: v<list delimiter>k: v}}` | null |
| anything else | passed through as text | null |

## Environment Variables

- `SSTLOAD_DELIMITER` - Field delimiter (default: `\x01`)
- `SSTLOAD_LIST_DELIMITER` - Collection member delimiter (default: `\x02`)
- `SSTLOAD_QUOTE` - Quote character; empty disables quoting
- `SSTLOAD_BUFFER_CAPACITY` - Parse buffer capacity in bytes (default: 104857600)
- `SSTLOAD_FAIL_FAST` - Stop at the first bad line (`true`/`false`)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - Logging

Command-line flags override environment variables.

## Exit Codes

| Code | Meaning |
|------|---------|
| 0 | Every line was converted; rows the writer rejected are only logged |
| 1 | The load failed |
| 2 | Invalid command line |
| 3 | The load finished but some lines could not be converted |

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("csv2sstable.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
