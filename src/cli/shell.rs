use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::entities::analysis::ResearchContext;

const PROMPT: &str = "deepgene> ";

const BANNER: &str = "DeepGene research shell. Type 'help' for commands, 'exit' to quit.";

const LOOKUP_USAGE: &str = "\
Usage: lookup <rsID> <annotation> <positional_gene>
Example: lookup rs116515942 intronic 'CTNND2 (delta catenin-2)'";

const HELP: &str = "\
Commands:
  lookup <rsID> <annotation> <positional_gene>   Research a variant
  gene <symbol>                                  Show MyGene.info metadata
  fetch <url>                                    Resolve a paper to abstract text
  history                                        rsIDs looked up this session
  help, ?                                        Show this help
  exit, quit                                     Leave the shell

Example: lookup rs116515942 intronic 'CTNND2 (delta catenin-2)'";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShellCommand {
    Lookup {
        rsid: String,
        annotation: String,
        positional_gene: String,
    },
    Gene(String),
    Fetch(String),
    History,
    Help,
    Exit,
    Empty,
}

/// Parses one input line; `Err` carries the usage text to show.
fn parse_line(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ShellCommand::Empty);
    }
    let args = shlex::split(line).ok_or_else(|| format!("Invalid command syntax: {line}"))?;
    let Some((cmd, rest)) = args.split_first() else {
        return Ok(ShellCommand::Empty);
    };

    match cmd.to_ascii_lowercase().as_str() {
        "lookup" => match rest {
            [rsid, annotation, gene @ ..] if !gene.is_empty() => Ok(ShellCommand::Lookup {
                rsid: rsid.clone(),
                annotation: annotation.clone(),
                positional_gene: gene.join(" "),
            }),
            _ => Err(LOOKUP_USAGE.to_string()),
        },
        "gene" => match rest {
            [symbol] => Ok(ShellCommand::Gene(symbol.clone())),
            _ => Err("Usage: gene <symbol>\nExample: gene CTNND2".to_string()),
        },
        "fetch" => match rest {
            [url] => Ok(ShellCommand::Fetch(url.clone())),
            _ => Err(
                "Usage: fetch <url>\nExample: fetch https://pubmed.ncbi.nlm.nih.gov/26366551/"
                    .to_string(),
            ),
        },
        "history" => Ok(ShellCommand::History),
        "help" | "?" => Ok(ShellCommand::Help),
        "exit" | "quit" => Ok(ShellCommand::Exit),
        other => Err(format!(
            "Unknown command: {other}. Type 'help' for available commands."
        )),
    }
}

struct Session<'a> {
    ctx: &'a ResearchContext,
    json: bool,
    history: Vec<String>,
}

impl<'a> Session<'a> {
    fn new(ctx: &'a ResearchContext, json: bool) -> Self {
        Self {
            ctx,
            json,
            history: Vec::new(),
        }
    }

    fn remember(&mut self, rsid: &str) {
        let rsid = rsid.trim();
        if !rsid.is_empty() && !self.history.iter().any(|seen| seen == rsid) {
            self.history.push(rsid.to_string());
        }
    }

    fn render_history(&self) -> String {
        if self.history.is_empty() {
            return "No lookups yet.".to_string();
        }
        self.history
            .iter()
            .enumerate()
            .map(|(idx, rsid)| format!("{}. {rsid}", idx + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn execute(&mut self, command: ShellCommand) -> anyhow::Result<String> {
        match command {
            ShellCommand::Lookup {
                rsid,
                annotation,
                positional_gene,
            } => {
                let report = super::lookup_report(
                    self.ctx,
                    &rsid,
                    &annotation,
                    &positional_gene,
                    true,
                    self.json,
                )
                .await?;
                self.remember(&rsid);
                Ok(report)
            }
            ShellCommand::Gene(symbol) => {
                super::gene_report(self.ctx.genes(), &symbol, self.json).await
            }
            ShellCommand::Fetch(url) => super::fetch_report(self.ctx.content(), &url, self.json).await,
            ShellCommand::History => Ok(self.render_history()),
            ShellCommand::Help => Ok(HELP.to_string()),
            ShellCommand::Exit | ShellCommand::Empty => Ok(String::new()),
        }
    }
}

/// Drives the shell over any line source; errors from a command are printed
/// and the loop continues.
async fn run_with<R, W>(
    ctx: &ResearchContext,
    reader: R,
    out: &mut W,
    json: bool,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut session = Session::new(ctx, json);
    let mut lines = reader.lines();
    writeln!(out, "{BANNER}")?;

    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            writeln!(out, "Goodbye!")?;
            break;
        };

        match parse_line(&line) {
            Ok(ShellCommand::Empty) => {}
            Ok(ShellCommand::Exit) => {
                writeln!(out, "Goodbye!")?;
                break;
            }
            Ok(command) => match session.execute(command).await {
                Ok(output) => writeln!(out, "{}", output.trim_end())?,
                Err(err) => writeln!(out, "Error: {err}")?,
            },
            Err(usage) => writeln!(out, "{usage}")?,
        }
    }
    Ok(())
}

/// Starts the interactive shell on stdin/stdout with one shared research context.
///
/// # Errors
///
/// Returns an error when the research context cannot be configured (for
/// example a missing Gemini key) or terminal IO fails.
pub async fn run(json: bool) -> anyhow::Result<()> {
    let ctx = ResearchContext::from_env()?;
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_with(&ctx, stdin, &mut stdout, json).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::entities::content::testing::StaticContent;
    use crate::generation::testing::ScriptedGenerator;
    use crate::sources::mygene::MyGeneClient;

    fn analysis() -> serde_json::Value {
        serde_json::json!({
            "function": ["Cell adhesion"],
            "diseases": [],
            "snps": []
        })
    }

    #[test]
    fn parse_line_joins_unquoted_positional_gene() {
        assert_eq!(
            parse_line("lookup rs116515942 intronic CTNND2 (delta catenin-2)"),
            Ok(ShellCommand::Lookup {
                rsid: "rs116515942".into(),
                annotation: "intronic".into(),
                positional_gene: "CTNND2 (delta catenin-2)".into(),
            })
        );
        assert_eq!(
            parse_line("LOOKUP rs1 intronic 'CTNND2 (delta catenin-2)'"),
            Ok(ShellCommand::Lookup {
                rsid: "rs1".into(),
                annotation: "intronic".into(),
                positional_gene: "CTNND2 (delta catenin-2)".into(),
            })
        );
    }

    #[test]
    fn parse_line_reports_usage_and_unknown_commands() {
        let usage = parse_line("lookup rs1 intronic").unwrap_err();
        assert!(usage.contains("Usage: lookup"));
        assert!(usage.contains("Example: lookup rs116515942 intronic 'CTNND2 (delta catenin-2)'"));
        assert!(parse_line("gene").unwrap_err().starts_with("Usage: gene"));
        assert!(parse_line("frobnicate").unwrap_err().starts_with("Unknown command"));
        assert!(parse_line("lookup 'rs1").unwrap_err().starts_with("Invalid command syntax"));
        assert_eq!(parse_line("   "), Ok(ShellCommand::Empty));
        assert_eq!(parse_line("?"), Ok(ShellCommand::Help));
        assert_eq!(parse_line("quit"), Ok(ShellCommand::Exit));
    }

    #[tokio::test]
    async fn shell_runs_lookups_and_tracks_deduplicated_history() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(analysis()),
            Ok(analysis()),
            Ok(analysis()),
        ]));
        let ctx = ResearchContext::with_parts(
            generator.clone(),
            Arc::new(StaticContent::default()),
            MyGeneClient::new_for_test("http://127.0.0.1:9".into()).unwrap(),
        );
        let input: &[u8] = b"history\n\
lookup rs1 intronic CTNND2 (delta catenin-2)\n\
lookup rs2 missense BRAF\n\
lookup rs1 intronic CTNND2\n\
lookup rs3\n\
history\n\
exit\n\
lookup rs9 intronic NEVER\n";
        let mut out = Vec::new();

        run_with(&ctx, input, &mut out, false).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with(BANNER));
        assert!(out.contains("deepgene> No lookups yet."));
        assert!(out.contains("# Gene Research Report: rs1\n"));
        assert!(out.contains("# Gene Research Report: rs2\n"));
        assert!(out.contains("Usage: lookup <rsID> <annotation> <positional_gene>"));
        assert!(out.contains("1. rs1\n2. rs2\n"));
        assert!(!out.contains("3. rs"));
        assert!(out.trim_end().ends_with("Goodbye!"));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn shell_prints_errors_and_says_goodbye_on_eof() {
        let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
        let ctx = ResearchContext::with_parts(
            generator,
            Arc::new(StaticContent::default().with_page("https://a.example/1", "Some abstract.")),
            MyGeneClient::new_for_test("http://127.0.0.1:9".into()).unwrap(),
        );
        let input: &[u8] = b"lookup rs1 intronic CTNND2\nfetch https://a.example/1\nhistory";
        let mut out = Vec::new();

        run_with(&ctx, input, &mut out, false).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Error: Gene analysis failed"));
        assert!(out.contains("# Content: https://a.example/1\n\nSome abstract."));
        assert!(out.contains("No lookups yet."));
        assert!(out.ends_with("\nGoodbye!\n"));
    }
}
