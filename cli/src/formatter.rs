use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Row, Table};
use mast::{Backend, Bindings, Mst};
use std::fmt::Display;
use std::time::Duration;

enum LineType {
    Branch,
    Last,
}

impl LineType {
    fn format_line(&self, base_prefix: &str, content: &str) -> String {
        let symbol = match self {
            LineType::Branch => "├─",
            LineType::Last => "└─",
        };
        format!("{}{} {}\n", base_prefix, symbol, content)
    }

    fn child_prefix(&self, base_prefix: &str) -> String {
        match self {
            LineType::Branch => format!("{}│  ", base_prefix),
            LineType::Last => format!("{}   ", base_prefix),
        }
    }
}

struct Timings {
    compile: Duration,
    total: Duration,
    per_call: Duration,
    result: String,
}

/// Outcome of timing one backend
pub struct BenchRow {
    backend: Backend,
    outcome: Result<Timings, String>,
}

impl BenchRow {
    pub fn measured(
        backend: Backend,
        compile: Duration,
        total: Duration,
        iterations: usize,
        result: String,
    ) -> Self {
        let per_call = if iterations == 0 {
            Duration::ZERO
        } else {
            total.div_f64(iterations as f64)
        };
        Self {
            backend,
            outcome: Ok(Timings {
                compile,
                total,
                per_call,
                result,
            }),
        }
    }

    pub fn failed(backend: Backend, error: String) -> Self {
        Self {
            backend,
            outcome: Err(error),
        }
    }
}

pub struct Formatter {}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn format_evaluation<T: Display>(
        &self,
        tree: &Mst,
        bindings: &Bindings<T>,
        value: &T,
        raw: bool,
    ) -> String {
        if raw {
            return format!("{}\n", value);
        }

        let mut output = String::new();
        if !bindings.is_empty() {
            output.push_str(&self.format_bindings_table(bindings));
            output.push('\n');
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.add_row(Row::from(vec![Cell::new(format!("{} = {}", tree, value))]));
        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    fn format_bindings_table<T: Display>(&self, bindings: &Bindings<T>) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(Row::from(vec![
            Cell::new("Symbol").set_alignment(CellAlignment::Left),
            Cell::new("Value").set_alignment(CellAlignment::Left),
        ]));

        let mut sorted: Vec<_> = bindings.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        for (symbol, value) in sorted {
            table.add_row(Row::from(vec![symbol.to_string(), value.to_string()]));
        }

        table.to_string()
    }

    pub fn format_listing(&self, backend: Backend, listing: &str) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(Row::from(vec![Cell::new(format!("{} backend", backend))]));
        table.add_row(Row::from(vec![Cell::new(listing.trim_end())]));
        format!("{}\n", table)
    }

    /// Render the tree one node per line, children indented under their operation
    pub fn format_tree(&self, tree: &Mst) -> String {
        let mut output = format!("{}\n", tree);
        self.format_node(tree, "", &LineType::Last, &mut output);
        output
    }

    fn format_node(&self, node: &Mst, prefix: &str, line: &LineType, output: &mut String) {
        let child_prefix = line.child_prefix(prefix);
        match node {
            Mst::Numeric(number) => output.push_str(&line.format_line(prefix, &number.to_string())),
            Mst::Symbolic(symbol) => output.push_str(&line.format_line(prefix, symbol.name())),
            Mst::Unary(operation, operand) => {
                output.push_str(&line.format_line(prefix, operation));
                self.format_node(operand, &child_prefix, &LineType::Last, output);
            }
            Mst::Binary(operation, left, right) => {
                output.push_str(&line.format_line(prefix, operation));
                self.format_node(left, &child_prefix, &LineType::Branch, output);
                self.format_node(right, &child_prefix, &LineType::Last, output);
            }
        }
    }

    pub fn format_bench(&self, tree: &Mst, iterations: usize, rows: &[BenchRow]) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(Row::from(vec![
            Cell::new("Backend").set_alignment(CellAlignment::Left),
            Cell::new("Compile").set_alignment(CellAlignment::Right),
            Cell::new("Total").set_alignment(CellAlignment::Right),
            Cell::new("Per call").set_alignment(CellAlignment::Right),
            Cell::new("Result").set_alignment(CellAlignment::Left),
        ]));

        for row in rows {
            let cells = match &row.outcome {
                Ok(timings) => vec![
                    Cell::new(row.backend),
                    Cell::new(format!("{:?}", timings.compile)).set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:?}", timings.total)).set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:?}", timings.per_call))
                        .set_alignment(CellAlignment::Right),
                    Cell::new(&timings.result),
                ],
                Err(error) => vec![
                    Cell::new(row.backend),
                    Cell::new("-").set_alignment(CellAlignment::Right),
                    Cell::new("-").set_alignment(CellAlignment::Right),
                    Cell::new("-").set_alignment(CellAlignment::Right),
                    Cell::new(error),
                ],
            };
            table.add_row(Row::from(cells));
        }

        format!("{}\n{} invocations each\n{}\n", tree, iterations, table)
    }
}
