use std::path::{Path, PathBuf};

use kiln_api::{BuildIssue, SourceFile};
use kiln_classfile::ClassFile;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::session::Session;

#[derive(Tabled)]
struct IssueRow {
    kind: String,
    file: String,
    line: u32,
    message: String,
}

impl IssueRow {
    fn from_issue(issue: &BuildIssue) -> Self {
        Self {
            kind: issue.kind.to_string(),
            file: issue.file.to_string(),
            // Displayed 1-based, like compilers print them
            line: issue.line + 1,
            message: issue.message.lines().next().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Tabled)]
struct DependencyRow {
    relation: &'static str,
    file: String,
}

pub async fn issues(path: PathBuf, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(&path)?;
    session.build_all().await?;
    let issues = session.workspace.issues()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else if issues.is_empty() {
        println!("No issues found.");
    } else {
        let rows: Vec<IssueRow> = issues.iter().map(IssueRow::from_issue).collect();
        println!("{}", Table::new(rows).with(Style::psql()));
    }
    Ok(())
}

pub async fn deps(
    path: PathBuf,
    file: PathBuf,
    refs: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(&path)?;
    let source = session
        .source_file(&file)
        .ok_or_else(|| format!("{} is outside the workspace", file.display()))?;
    session.build_all().await?;

    let workspace = &session.workspace;
    let mut rows = Vec::new();
    let relations: [(&'static str, Vec<SourceFile>); 2] = [
        ("depends on", workspace.dependencies(&source)?.into_iter().collect()),
        ("used by", workspace.dependents(&source)?.into_iter().collect()),
    ];
    for (relation, files) in relations {
        rows.extend(files.into_iter().map(|file| DependencyRow {
            relation,
            file: file.to_string(),
        }));
    }

    if rows.is_empty() {
        println!("{source} has no workspace dependencies.");
    } else {
        println!("{}", Table::new(rows).with(Style::psql()));
    }

    if refs {
        println!("\nReferences:");
        for reference in workspace.references(&source)? {
            println!("  {reference}");
        }
    }
    Ok(())
}

pub fn inspect(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(file)?;
    let class = ClassFile::parse(&bytes)?;
    println!("{class}");
    Ok(())
}
