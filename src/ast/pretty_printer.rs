use std::fmt;

use crate::ast::indices::AstIdx;
use crate::ast::pool::{AstPool, Program};
use crate::ast::{CsrSelector, Literal, LiteralWidth, Node, StepOp, TypeName};

#[derive(Debug, Clone)]
pub struct PrintConfig {
    pub indent_is_tab: bool,
    pub indent_size: usize,
    pub spaces_around_operators: bool,
    pub newlines_after_functions: bool,
    /// Wrap every binary expression in parentheses so associativity is
    /// visible in the output.
    pub parenthesize_binary: bool,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            indent_is_tab: false,
            indent_size: 2,
            spaces_around_operators: true,
            newlines_after_functions: true,
            parenthesize_binary: false,
        }
    }
}

/// Renders nodes back to IDL source. Output re-parses to an equivalent
/// tree; only literal radixes and layout are not preserved.
pub struct PrettyPrinter<'a> {
    pool: &'a AstPool,
    config: PrintConfig,
}

impl<'a> PrettyPrinter<'a> {
    pub fn new(pool: &'a AstPool) -> Self {
        Self {
            pool,
            config: PrintConfig::default(),
        }
    }

    pub fn with_config(pool: &'a AstPool, config: PrintConfig) -> Self {
        Self { pool, config }
    }

    pub fn print_node(&self, node_idx: AstIdx) -> String {
        let mut output = String::new();
        self.print_node_to_string(node_idx, 0, &mut output);
        output
    }

    fn indent(&self, level: usize) -> String {
        if self.config.indent_is_tab {
            "\t".repeat(level)
        } else {
            " ".repeat(level * self.config.indent_size)
        }
    }

    fn print_node_to_string(&self, node_idx: AstIdx, indent_level: usize, output: &mut String) {
        match &self.pool[node_idx] {
            Node::Isa(items) => {
                for &item in items {
                    self.print_node_to_string(item, indent_level, output);
                    output.push('\n');
                    if self.config.newlines_after_functions
                        && matches!(self.pool[item], Node::FunctionDef { .. })
                    {
                        output.push('\n');
                    }
                }
            }
            Node::Fragment(items) => self.print_statements(items, indent_level, output),

            Node::EnumDef { name, members } => {
                output.push_str(&self.indent(indent_level));
                output.push_str("enum ");
                output.push_str(&self.pool[*name]);
                output.push_str(" {\n");
                for member in members {
                    output.push_str(&self.indent(indent_level + 1));
                    output.push_str(&self.pool[member.name]);
                    if let Some(value) = member.value {
                        output.push_str(&format!(" {value}"));
                    }
                    output.push('\n');
                }
                output.push_str(&self.indent(indent_level));
                output.push('}');
            }
            Node::BitfieldDef {
                name,
                width,
                fields,
            } => {
                output.push_str(&self.indent(indent_level));
                output.push_str(&format!("bitfield ({width}) {} {{\n", &self.pool[*name]));
                for field in fields {
                    output.push_str(&self.indent(indent_level + 1));
                    output.push_str(&self.pool[field.name]);
                    if field.msb == field.lsb {
                        output.push_str(&format!(" {}\n", field.msb));
                    } else {
                        output.push_str(&format!(" {}-{}\n", field.msb, field.lsb));
                    }
                }
                output.push_str(&self.indent(indent_level));
                output.push('}');
            }
            Node::FunctionDef {
                name,
                template,
                returns,
                args,
                description,
                body,
            } => {
                let inner = self.indent(indent_level + 1);
                output.push_str(&self.indent(indent_level));
                if body.is_none() {
                    output.push_str("builtin ");
                }
                output.push_str("function ");
                output.push_str(&self.pool[*name]);
                output.push_str(" {\n");

                if !template.is_empty() {
                    let params: Vec<String> = template
                        .iter()
                        .map(|t| format!("{} {}", self.print_node(t.ty), &self.pool[t.name]))
                        .collect();
                    output.push_str(&format!("{inner}template {}\n", params.join(", ")));
                }
                if !returns.is_empty() {
                    let types: Vec<String> = returns.iter().map(|r| self.print_node(*r)).collect();
                    output.push_str(&format!("{inner}returns {}\n", types.join(", ")));
                }
                if !args.is_empty() {
                    let params: Vec<String> = args
                        .iter()
                        .map(|a| format!("{} {}", self.print_node(a.ty), &self.pool[a.name]))
                        .collect();
                    output.push_str(&format!("{inner}arguments {}\n", params.join(", ")));
                }
                if let Some(text) = description {
                    output.push_str(&format!(
                        "{inner}description {{\n{}{}\n{inner}}}\n",
                        self.indent(indent_level + 2),
                        self.pool[*text].trim()
                    ));
                }
                if let Some(body) = body {
                    output.push_str(&format!("{inner}body {{\n"));
                    self.print_statements(body, indent_level + 2, output);
                    output.push_str(&format!("{inner}}}\n"));
                }

                output.push_str(&self.indent(indent_level));
                output.push('}');
            }
            Node::GlobalConstant(decl) => {
                output.push_str(&self.indent(indent_level));
                output.push_str(&self.action(*decl));
                output.push(';');
            }

            Node::If {
                cond,
                then_body,
                else_ifs,
                else_body,
            } => {
                output.push_str(&self.indent(indent_level));
                output.push_str(&format!("if ({}) ", self.print_node(*cond)));
                self.print_block(then_body, indent_level, output);
                for arm in else_ifs {
                    output.push_str(&format!(" else if ({}) ", self.print_node(arm.cond)));
                    self.print_block(&arm.body, indent_level, output);
                }
                if let Some(body) = else_body {
                    output.push_str(" else ");
                    self.print_block(body, indent_level, output);
                }
            }
            Node::For {
                init,
                cond,
                update,
                body,
            } => {
                output.push_str(&self.indent(indent_level));
                output.push_str(&format!(
                    "for ({}; {}; {}) ",
                    self.action(*init),
                    self.print_node(*cond),
                    self.action(*update)
                ));
                self.print_block(body, indent_level, output);
            }
            Node::Return(values) => {
                output.push_str(&self.indent(indent_level));
                if values.is_empty() {
                    output.push_str("return;");
                } else {
                    output.push_str(&format!("return {};", self.list(values)));
                }
            }
            Node::ConditionalReturn { values, cond } => {
                output.push_str(&self.indent(indent_level));
                output.push_str(&format!(
                    "return {} if ({});",
                    self.list(values),
                    self.print_node(*cond)
                ));
            }
            Node::Conditional { stmt, cond } => {
                output.push_str(&self.indent(indent_level));
                output.push_str(&format!(
                    "{} if ({});",
                    self.action(*stmt),
                    self.print_node(*cond)
                ));
            }
            Node::Declaration { .. }
            | Node::DeclarationInit { .. }
            | Node::Assign { .. }
            | Node::MultiAssign { .. }
            | Node::Step { .. }
            | Node::CallStatement(_) => {
                output.push_str(&self.indent(indent_level));
                output.push_str(&self.action(node_idx));
                output.push(';');
            }

            Node::TypeName(name) => output.push_str(&self.type_name(name)),

            _ => output.push_str(&self.expr(node_idx)),
        }
    }

    fn print_statements(&self, body: &[AstIdx], indent_level: usize, output: &mut String) {
        for &stmt in body {
            self.print_node_to_string(stmt, indent_level, output);
            output.push('\n');
        }
    }

    fn print_block(&self, body: &[AstIdx], indent_level: usize, output: &mut String) {
        output.push_str("{\n");
        self.print_statements(body, indent_level + 1, output);
        output.push_str(&self.indent(indent_level));
        output.push('}');
    }

    /// A simple statement without its terminating `;`.
    fn action(&self, idx: AstIdx) -> String {
        match &self.pool[idx] {
            Node::Declaration {
                ty,
                names,
                array_len,
            } => {
                let names: Vec<&str> = names.iter().map(|n| &self.pool[*n]).collect();
                let mut out = format!("{} {}", self.print_node(*ty), names[0]);
                if let Some(len) = array_len {
                    out.push_str(&format!("[{}]", self.expr(*len)));
                }
                for name in &names[1..] {
                    out.push_str(&format!(", {name}"));
                }
                out
            }
            Node::DeclarationInit {
                ty,
                name,
                array_len,
                init,
            } => {
                let size = array_len
                    .map(|len| format!("[{}]", self.expr(len)))
                    .unwrap_or_default();
                format!(
                    "{} {}{size} = {}",
                    self.print_node(*ty),
                    &self.pool[*name],
                    self.expr(*init)
                )
            }
            Node::Assign { target, value } => {
                format!("{} = {}", self.expr(*target), self.expr(*value))
            }
            Node::MultiAssign { targets, value } => {
                format!("({}) = {}", self.list(targets), self.expr(*value))
            }
            Node::Step { target, op } => {
                let op = match op {
                    StepOp::Increment => "++",
                    StepOp::Decrement => "--",
                };
                format!("{}{op}", self.expr(*target))
            }
            Node::CallStatement(call) => self.expr(*call),
            _ => self.expr(idx),
        }
    }

    fn list(&self, items: &[AstIdx]) -> String {
        items
            .iter()
            .map(|item| self.expr(*item))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn type_name(&self, name: &TypeName) -> String {
        match name {
            TypeName::Bits(width) => match &self.pool[*width] {
                Node::IntLiteral(_) | Node::Id(_) => format!("Bits<{}>", self.expr(*width)),
                _ => format!("Bits<({})>", self.expr(*width)),
            },
            TypeName::XReg => "XReg".to_string(),
            TypeName::U32 => "U32".to_string(),
            TypeName::U64 => "U64".to_string(),
            TypeName::Boolean => "Boolean".to_string(),
            TypeName::String => "String".to_string(),
            TypeName::User(name) => self.pool[*name].to_string(),
        }
    }

    fn expr(&self, idx: AstIdx) -> String {
        match &self.pool[idx] {
            Node::IntLiteral(lit) => literal(lit),
            Node::BoolLiteral(b) => b.to_string(),
            Node::StringLiteral(s) => format!("\"{}\"", &self.pool[*s]),
            Node::Id(name) => self.pool[*name].to_string(),
            Node::Paren(inner) => format!("({})", self.expr(*inner)),
            Node::Unary { op, operand } => format!("{}{}", op.symbol(), self.expr(*operand)),
            Node::Binary { op, lhs, rhs } => {
                let text = if self.config.spaces_around_operators {
                    format!("{} {} {}", self.expr(*lhs), op.symbol(), self.expr(*rhs))
                } else {
                    format!("{}{}{}", self.expr(*lhs), op.symbol(), self.expr(*rhs))
                };
                if self.config.parenthesize_binary {
                    format!("({text})")
                } else {
                    text
                }
            }
            Node::Ternary {
                cond,
                if_true,
                if_false,
            } => format!(
                "{} ? {} : {}",
                self.expr(*cond),
                self.expr(*if_true),
                self.expr(*if_false)
            ),
            Node::Concat(items) => format!("{{{}}}", self.list(items)),
            Node::Replicate { count, expr } => {
                format!("{{{}{{{}}}}}", self.expr(*count), self.expr(*expr))
            }
            Node::BitExtract { expr, index } => {
                format!("{}[{}]", self.expr(*expr), self.expr(*index))
            }
            Node::RangeExtract { expr, msb, lsb } => format!(
                "{}[{}:{}]",
                self.expr(*expr),
                self.expr(*msb),
                self.expr(*lsb)
            ),
            Node::FieldAccess { expr, field } => {
                format!("{}.{}", self.expr(*expr), &self.pool[*field])
            }
            Node::EnumRef { enum_name, member } => {
                format!("{}::{}", &self.pool[*enum_name], &self.pool[*member])
            }
            Node::Call {
                name,
                template_args,
                args,
            } => {
                let mut out = self.pool[*name].to_string();
                if !template_args.is_empty() {
                    let targs: Vec<String> = template_args
                        .iter()
                        .map(|arg| match &self.pool[*arg] {
                            Node::IntLiteral(_) | Node::Id(_) | Node::Paren(_) => self.expr(*arg),
                            _ => format!("({})", self.expr(*arg)),
                        })
                        .collect();
                    out.push_str(&format!("<{}>", targs.join(", ")));
                }
                out.push_str(&format!("({})", self.list(args)));
                out
            }
            Node::Builtin { func, args } => format!("{}({})", func.name(), self.list(args)),
            Node::Implemented(ext) => format!("implemented?({})", self.expr(*ext)),
            Node::XReg(index) => format!("X[{}]", self.expr(*index)),
            Node::Csr(CsrSelector::Name(name)) => format!("CSR[{}]", &self.pool[*name]),
            Node::Csr(CsrSelector::Address(addr)) => format!("CSR[{}]", self.expr(*addr)),
            Node::CsrField { csr, field } => {
                format!("{}.{}", self.expr(*csr), &self.pool[*field])
            }
            Node::CsrMethodCall { csr, method, args } => {
                format!("{}.{}({})", self.expr(*csr), method.name(), self.list(args))
            }
            Node::TypeName(name) => self.type_name(name),
            _ => {
                let mut out = String::new();
                self.print_node_to_string(idx, 0, &mut out);
                out
            }
        }
    }
}

/// Literal text that parses back to the same width, signedness and value.
fn literal(lit: &Literal) -> String {
    let sign = if lit.signed { "s" } else { "" };
    match lit.width {
        LiteralWidth::Explicit(w) => format!("{w}'{sign}d{}", lit.magnitude),
        LiteralWidth::Xlen => format!("XLEN'{sign}d{}", lit.magnitude),
        LiteralWidth::Minimal(_) => format!("{}{sign}", lit.magnitude),
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", PrettyPrinter::new(&self.pool).print_node(self.root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_fragment, parse_isa};

    fn config(parenthesize_binary: bool) -> PrintConfig {
        PrintConfig {
            parenthesize_binary,
            ..PrintConfig::default()
        }
    }

    #[test]
    fn parenthesized_output_shows_left_associativity() {
        let program = parse_expression("t", "a - b - c << 1").unwrap();
        let printer = PrettyPrinter::with_config(&program.pool, config(true));
        assert_eq!(printer.print_node(program.root), "(((a - b) - c) << 1)");
    }

    #[test]
    fn literals_keep_width_and_sign() {
        let program = parse_expression("t", "{4'sd13, 8'hff, XLEN'1, 5s, 7}").unwrap();
        assert_eq!(program.to_string(), "{4'sd13, 8'd255, XLEN'd1, 5s, 7}");
    }

    #[test]
    fn fragment_round_trips() {
        let source = "\
Bits<8> a = 1;
if (a == 1) {
  a = a + 1;
} else {
  a--;
}
a[3:0] = 4'd2 if (a > 0);
";
        let program = parse_fragment("t", source).unwrap();
        assert_eq!(program.to_string(), source);

        let again = parse_fragment("t", &program.to_string()).unwrap();
        assert_eq!(again.to_string(), source);
    }

    #[test]
    fn isa_definitions_round_trip() {
        let source = "\
enum Mode {
  M 3
  U
}
bitfield (8) Satp {
  MODE 7-4
  V 0
}
function pick {
  template Bits<8> N
  returns Bits<N>
  arguments Bits<N> a
  description {
    Returns its argument.
  }
  body {
    return a;
  }
}

";
        let program = parse_isa("t", source).unwrap();
        assert_eq!(program.to_string(), source);
    }
}
