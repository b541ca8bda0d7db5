//! Exports of a notebook: Markdown, standalone HTML, an interactive page
//! and per-chapter pages

use pulldown_cmark::{html, Options, Parser};

use crate::model::{Cell, CellType, Notebook, OutputData, OutputKind};
use crate::util::html::{escape, script_safe_json};

/// Browser Python runtime used by the interactive export
const PYODIDE_URL: &str = "https://cdn.jsdelivr.net/pyodide/v0.24.1/full/pyodide.js";

/// Output format for [`crate::data::FileStore::export`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// The JSON notebook document
    Notebook,
    Html,
    /// HTML page with editable code cells run in the browser
    InteractiveHtml,
    Markdown,
    /// Zip of an index page plus one HTML page per chapter
    ChaptersZip,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Notebook => "notebook",
            ExportFormat::Html => "html",
            ExportFormat::InteractiveHtml => "html-interactive",
            ExportFormat::Markdown => "markdown",
            ExportFormat::ChaptersZip => "chapters",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Notebook => "notebook",
            ExportFormat::Html | ExportFormat::InteractiveHtml => "html",
            ExportFormat::Markdown => "md",
            ExportFormat::ChaptersZip => "zip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "notebook" | "json" => Some(ExportFormat::Notebook),
            "html" => Some(ExportFormat::Html),
            "html-interactive" | "interactive" => Some(ExportFormat::InteractiveHtml),
            "markdown" | "md" => Some(ExportFormat::Markdown),
            "chapters" | "zip" => Some(ExportFormat::ChaptersZip),
            _ => None,
        }
    }
}

/// Script of the interactive page. Code cells run through Pyodide, loaded
/// on first use.
const INTERACTIVE_SCRIPT: &str = r#"
let pyodide = null;
const status = document.getElementById('status');

async function ensurePython() {
  if (pyodide) return pyodide;
  status.textContent = 'Loading Python...';
  pyodide = await loadPyodide();
  status.textContent = 'Ready';
  return pyodide;
}

async function runCell(cell) {
  const py = await ensurePython();
  const editor = cell.querySelector('.code-editor');
  const output = cell.querySelector('.cell-output');
  const badge = cell.querySelector('.cell-status');
  badge.textContent = 'Running...';
  try {
    await py.runPythonAsync('import sys, io
sys.stdout = io.StringIO()');
    const result = await py.runPythonAsync(editor.value);
    const stdout = await py.runPythonAsync('sys.stdout.getvalue()');
    const pre = document.createElement('pre');
    pre.className = 'output-text';
    pre.textContent = stdout || (result === undefined ? '' : String(result)) || '(No output)';
    output.replaceChildren(pre);
    badge.textContent = 'ok';
  } catch (e) {
    const pre = document.createElement('pre');
    pre.className = 'output-error';
    pre.textContent = e.message;
    output.replaceChildren(pre);
    badge.textContent = 'error';
  }
}

document.querySelectorAll('.run-cell').forEach(button => {
  button.addEventListener('click', () => runCell(button.closest('.cell')));
});
document.getElementById('run-all').addEventListener('click', async () => {
  for (const cell of document.querySelectorAll('.cell-code')) await runCell(cell);
});
document.getElementById('clear-outputs').addEventListener('click', () => {
  document.querySelectorAll('.cell-code .cell-output').forEach(el => el.replaceChildren());
});
document.querySelectorAll('.collapse-btn').forEach(button => {
  button.addEventListener('click', () => {
    const cells = button.closest('.chapter').querySelector('.chapter-cells');
    const hidden = cells.style.display === 'none';
    cells.style.display = hidden ? '' : 'none';
    button.textContent = hidden ? '-' : '+';
  });
});
"#;

/// Render Markdown to HTML
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(source, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Lowercase, runs of non-alphanumerics collapsed to `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

pub fn to_markdown(notebook: &Notebook) -> String {
    let mut md = format!("# {}\n\n", notebook.title);
    if !notebook.description.is_empty() {
        md.push_str(&notebook.description);
        md.push_str("\n\n");
    }
    md.push_str("---\n\n## Table of Contents\n\n");
    for (i, chapter) in notebook.chapters().iter().enumerate() {
        md.push_str(&format!(
            "{}. [{}](#{})\n",
            i + 1,
            chapter.title,
            slugify(&chapter.title)
        ));
    }
    md.push_str("\n---\n\n");

    for chapter in notebook.chapters() {
        md.push_str(&format!("## {}\n\n", chapter.title));
        for cell in chapter.cells() {
            md.push_str(&cell_markdown(cell));
            md.push_str("\n\n");
        }
    }
    md
}

fn cell_markdown(cell: &Cell) -> String {
    match cell.cell_type() {
        CellType::Code => {
            let mut md = format!("```{}\n{}\n```", cell.language, cell.content());
            if let Some(output) = cell.output() {
                match output.kind {
                    OutputKind::Image => md.push_str(&format!("\n\n![output]({})", output.content)),
                    OutputKind::Text | OutputKind::Error => {
                        md.push_str(&format!("\n\n```\n{}\n```", output.content))
                    }
                    OutputKind::Html => {}
                }
            }
            md
        }
        CellType::Latex => format!("$$\n{}\n$$", cell.content()),
        _ => cell.content().to_string(),
    }
}

/// Standalone HTML page. The notebook document is embedded as
/// `window.NOTEBOOK_DATA` so the file can be imported again.
pub fn to_html(notebook: &Notebook) -> Result<String, serde_json::Error> {
    let data = script_safe_json(&serde_json::to_string(notebook)?);
    let title = escape(&notebook.title);

    let toc: String = notebook
        .chapters()
        .iter()
        .map(|ch| {
            format!(
                "<li><a href=\"#chapter-{}\">{}</a></li>\n",
                escape(ch.id().as_str()),
                escape(&ch.title)
            )
        })
        .collect();

    let mut chapters = String::new();
    for chapter in notebook.chapters() {
        chapters.push_str(&format!(
            "<section class=\"chapter\" id=\"chapter-{}\">\n<h2 class=\"chapter-title\">{}</h2>\n<div class=\"chapter-cells\">\n",
            escape(chapter.id().as_str()),
            escape(&chapter.title)
        ));
        for cell in chapter.cells() {
            chapters.push_str(&cell_html(cell));
        }
        chapters.push_str("</div>\n</section>\n");
    }

    let description = if notebook.description.is_empty() {
        String::new()
    } else {
        format!(
            "<p class=\"description\">{}</p>\n",
            escape(&notebook.description)
        )
    };
    let author = if notebook.metadata.author.is_empty() {
        "Unknown".to_string()
    } else {
        escape(&notebook.metadata.author)
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
</head>
<body>
<div class="notebook">
<header class="notebook-header">
<h1>{title}</h1>
{description}<div class="metadata"><span>Author: {author}</span> <span>Created: {created}</span></div>
</header>
<nav class="toc">
<h3>Table of Contents</h3>
<ul>
{toc}</ul>
</nav>
<main class="chapters">
{chapters}</main>
</div>
<script>
window.NOTEBOOK_DATA = {data};
</script>
</body>
</html>
"#,
        created = notebook.metadata.created_at.format("%Y-%m-%d"),
    ))
}

fn cell_html(cell: &Cell) -> String {
    let body = match cell.cell_type() {
        CellType::Code => {
            let mut body = format!(
                "<div class=\"cell-input\"><pre class=\"code-block language-{}\"><code>{}</code></pre></div>",
                escape(&cell.language),
                escape(cell.content())
            );
            if let Some(output) = cell.output() {
                body.push_str(&format!(
                    "<div class=\"cell-output\">{}</div>",
                    output_html(output)
                ));
            }
            body
        }
        CellType::Markdown => format!(
            "<div class=\"markdown-content\">{}</div>",
            render_markdown(cell.content())
        ),
        CellType::Latex => format!(
            "<div class=\"latex-content\">$${}$$</div>",
            escape(cell.content())
        ),
        CellType::Html => format!("<div class=\"cell-content\">{}</div>", cell.content()),
        CellType::Slider | CellType::Image => {
            let mut body = format!(
                "<div class=\"cell-content\">{}</div>",
                escape(cell.content())
            );
            if let Some(output) = cell.output() {
                body.push_str(&output_html(output));
            }
            body
        }
    };
    format!(
        "<div class=\"cell cell-{}\" id=\"cell-{}\">{}</div>\n",
        cell.cell_type(),
        escape(cell.id().as_str()),
        body
    )
}

/// Page where code cells are editable and run in the browser. The document
/// is embedded like [`to_html`] so the page can be imported again.
pub fn to_interactive_html(notebook: &Notebook) -> Result<String, serde_json::Error> {
    let data = script_safe_json(&serde_json::to_string(notebook)?);
    let title = escape(&notebook.title);

    let mut chapters = String::new();
    for chapter in notebook.chapters() {
        chapters.push_str(&format!(
            "<section class=\"chapter\" id=\"chapter-{}\">\n<div class=\"chapter-header\"><h2 class=\"chapter-title\">{}</h2><button class=\"collapse-btn\">-</button></div>\n<div class=\"chapter-cells\">\n",
            escape(chapter.id().as_str()),
            escape(&chapter.title)
        ));
        for cell in chapter.cells() {
            chapters.push_str(&interactive_cell_html(cell));
        }
        chapters.push_str("</div>\n</section>\n");
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<script src="{PYODIDE_URL}"></script>
</head>
<body>
<div class="notebook">
<header class="notebook-header">
<h1>{title}</h1>
<div class="toolbar"><button id="run-all">Run All</button> <button id="clear-outputs">Clear Outputs</button> <span id="status">Ready</span></div>
</header>
<main class="chapters">
{chapters}</main>
</div>
<script>
window.NOTEBOOK_DATA = {data};
</script>
<script>{INTERACTIVE_SCRIPT}</script>
</body>
</html>
"#
    ))
}

fn interactive_cell_html(cell: &Cell) -> String {
    if cell.cell_type() != CellType::Code {
        return cell_html(cell);
    }
    let output = cell.output().map(output_html).unwrap_or_default();
    format!(
        "<div class=\"cell cell-code\" id=\"cell-{}\"><div class=\"cell-toolbar\"><button class=\"run-cell\">Run</button> <span class=\"cell-status\"></span></div><div class=\"cell-input\"><textarea class=\"code-editor\" rows=\"5\">{}</textarea></div><div class=\"cell-output\">{}</div></div>\n",
        escape(cell.id().as_str()),
        escape(cell.content()),
        output
    )
}

/// Files of a per-chapter export: `index.html` linking `chapter-{n}.html`
/// pages, each a standalone export of one chapter with previous, index and
/// next links.
pub fn chapter_pages(notebook: &Notebook) -> Result<Vec<(String, String)>, serde_json::Error> {
    let chapters = notebook.chapters();
    let links: String = chapters
        .iter()
        .enumerate()
        .map(|(i, ch)| {
            format!(
                "<li><a href=\"chapter-{n}.html\">{n}. {}</a></li>\n",
                escape(&ch.title),
                n = i + 1
            )
        })
        .collect();
    let index = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title} - Index</title>
</head>
<body>
<h1>{title}</h1>
<p>{description}</p>
<h2>Chapters</h2>
<ul class="chapter-list">
{links}</ul>
</body>
</html>
"#,
        title = escape(&notebook.title),
        description = escape(&notebook.description),
    );

    let mut files = vec![("index.html".to_string(), index)];
    for (i, chapter) in chapters.iter().enumerate() {
        let mut single = Notebook::from_chapters(chapter.title.clone(), vec![chapter.clone()])
            .map_err(<serde_json::Error as serde::ser::Error>::custom)?;
        single.metadata.author = notebook.metadata.author.clone();
        single.metadata.created_at = notebook.metadata.created_at;

        let mut nav = String::from("<nav class=\"chapter-nav\">");
        if i > 0 {
            nav.push_str(&format!("<a href=\"chapter-{i}.html\">Previous</a> "));
        }
        nav.push_str("<a href=\"index.html\">Index</a>");
        if i + 1 < chapters.len() {
            nav.push_str(&format!(" <a href=\"chapter-{}.html\">Next</a>", i + 2));
        }
        nav.push_str("</nav>\n");

        let mut page = to_html(&single)?;
        let at = page.rfind("</body>").unwrap_or(page.len());
        page.insert_str(at, &nav);
        files.push((format!("chapter-{}.html", i + 1), page));
    }
    Ok(files)
}

fn output_html(output: &OutputData) -> String {
    match output.kind {
        OutputKind::Text => format!("<pre class=\"output-text\">{}</pre>", escape(&output.content)),
        OutputKind::Error => format!(
            "<pre class=\"output-error\">{}</pre>",
            escape(&output.content)
        ),
        OutputKind::Image => format!(
            "<img class=\"output-image\" src=\"{}\" alt=\"output\">",
            escape(&output.content)
        ),
        OutputKind::Html => format!("<div class=\"output-html\">{}</div>", output.content),
    }
}
