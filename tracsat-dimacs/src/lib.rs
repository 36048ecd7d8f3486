//! DIMACS CNF parser and writer for the Tracsat SAT solver.

use std::{io, mem::replace};

use tracsat_formula::{CnfFormula, Lit, Var};

use anyhow::Error;
use thiserror::Error;

/// Possible errors while parsing a DIMACS CNF formula.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error(
        "line {}: Unexpected character in DIMACS CNF input: '{}'",
        line,
        unexpected
    )]
    UnexpectedInput { line: usize, unexpected: char },
    #[error(
        "line {}: Literal index is too large: {}{}...",
        line,
        index,
        final_digit
    )]
    LiteralTooLarge {
        line: usize,
        index: usize,
        final_digit: usize,
    },
    #[error("line {}: Invalid header syntax: {}", line, header)]
    InvalidHeader { line: usize, header: String },
    #[error("line {}: Unterminated clause", line)]
    UnterminatedClause { line: usize },
    #[error(
        "Formula has {} variables while the header specifies {} variables",
        var_count,
        header_var_count
    )]
    VarCount {
        var_count: usize,
        header_var_count: usize,
    },
    #[error(
        "Formula has {} clauses while the header specifies {} clauses",
        clause_count,
        header_clause_count
    )]
    ClauseCount {
        clause_count: usize,
        header_clause_count: usize,
    },
    #[error("Parser invoked after a previous error")]
    PreviousError,
}

/// Variable and clause count present in a DIMACS CNF header.
#[derive(Copy, Clone, Debug)]
pub struct DimacsHeader {
    pub var_count: usize,
    pub clause_count: usize,
}

/// Parser for DIMACS CNF files.
///
/// This parser can consume the input in chunks while also producing the parsed
/// result in chunks.
#[derive(Default)]
pub struct DimacsParser {
    formula: CnfFormula,
    partial_clause: Vec<Lit>,
    header: Option<DimacsHeader>,

    line_number: usize,
    clause_count: usize,
    var_count: usize,
    partial_lit: usize,
    negate_next_lit: bool,

    in_lit: bool,
    in_comment_or_header: bool,
    in_header: bool,
    start_of_line: bool,
    error: bool,

    header_line: Vec<u8>,
}

impl DimacsParser {
    /// Create a new DIMACS CNF parser.
    pub fn new() -> DimacsParser {
        DimacsParser {
            line_number: 1,
            start_of_line: true,
            ..DimacsParser::default()
        }
    }

    /// Parse the given input and check the header if present.
    ///
    /// This parses the whole input into a single
    /// [`CnfFormula`](tracsat_formula::CnfFormula). Incremental parsing is
    /// possible using [`parse_incremental`](DimacsParser::parse_incremental)
    /// or the [`parse_chunk`](DimacsParser::parse_chunk) method.
    pub fn parse(input: impl io::Read) -> Result<CnfFormula, Error> {
        Ok(Self::parse_incremental(input, |_| Ok(()))?.take_formula())
    }

    /// Parse the given input incrementally and check the header if present.
    ///
    /// The callback is invoked repeatedly with a reference to the parser. The
    /// callback can process the formula incrementally by calling
    /// [`take_formula`](DimacsParser::take_formula) on the passed argument.
    pub fn parse_incremental(
        input: impl io::Read,
        mut callback: impl FnMut(&mut DimacsParser) -> Result<(), Error>,
    ) -> Result<DimacsParser, Error> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = Self::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);

            callback(&mut parser)?;
        }
        parser.eof()?;
        callback(&mut parser)?;
        parser.check_header()?;

        Ok(parser)
    }

    /// Parse a chunk of input.
    ///
    /// After parsing the last chunk call the [`eof`](DimacsParser::eof) method.
    ///
    /// If this method returns an error, the parser is in an invalid state and
    /// cannot parse further chunks.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Result<(), ParserError> {
        if self.error {
            return Err(ParserError::PreviousError);
        }
        for &byte in chunk.iter() {
            if byte == b'\n' {
                self.line_number += 1;
            }
            match byte {
                b'\n' | b'\r' if self.in_comment_or_header => {
                    if self.in_header {
                        self.in_header = false;
                        self.parse_header_line()?;
                    }
                    self.in_comment_or_header = false;
                    self.start_of_line = true
                }
                _ if self.in_comment_or_header => {
                    if self.in_header {
                        self.header_line.push(byte);
                    }
                }
                b'0'..=b'9' => {
                    self.in_lit = true;
                    let digit = (byte - b'0') as usize;

                    const CAN_OVERFLOW: usize = Var::max_count() / 10;
                    const OVERFLOW_DIGIT: usize = Var::max_count() % 10;

                    // Overflow check that is fast but still works if LitIdx has
                    // the same size as usize
                    if CAN_OVERFLOW <= self.partial_lit {
                        let carry = (digit <= OVERFLOW_DIGIT) as usize;

                        if CAN_OVERFLOW + carry <= self.partial_lit {
                            self.error = true;
                            return Err(ParserError::LiteralTooLarge {
                                line: self.line_number,
                                index: self.partial_lit,
                                final_digit: digit,
                            });
                        }
                    }

                    self.partial_lit = self.partial_lit * 10 + digit;

                    self.start_of_line = false
                }
                b'-' if !self.negate_next_lit && !self.in_lit => {
                    self.negate_next_lit = true;
                    self.start_of_line = false
                }
                b' ' | b'\t' | b'\n' | b'\r' if !self.negate_next_lit || self.in_lit => {
                    self.finish_literal();
                    self.negate_next_lit = false;
                    self.in_lit = false;
                    self.partial_lit = 0;
                    self.start_of_line = byte != b' ' && byte != b'\t';
                }
                b'c' if self.start_of_line => {
                    self.in_comment_or_header = true;
                }
                b'p' if self.start_of_line && self.header.is_none() => {
                    self.in_comment_or_header = true;
                    self.in_header = true;
                    self.header_line.push(b'p');
                }
                _ => {
                    self.error = true;
                    return Err(ParserError::UnexpectedInput {
                        line: self.line_number,
                        unexpected: byte as char,
                    });
                }
            }
        }

        Ok(())
    }

    /// Finish parsing the input.
    ///
    /// This does not check whether the header information was correct, call
    /// [`check_header`](DimacsParser::check_header) for this.
    pub fn eof(&mut self) -> Result<(), ParserError> {
        if self.error {
            return Err(ParserError::PreviousError);
        }
        if self.in_header {
            self.in_header = false;
            self.parse_header_line()?;
        }

        self.finish_literal();

        if !self.partial_clause.is_empty() {
            self.error = true;
            return Err(ParserError::UnterminatedClause {
                line: self.line_number,
            });
        }

        Ok(())
    }

    /// Verifies the header information when present.
    ///
    /// Does nothing when the input doesn't contain a header.
    pub fn check_header(&self) -> Result<(), ParserError> {
        if let Some(header) = self.header {
            if self.var_count > header.var_count {
                return Err(ParserError::VarCount {
                    var_count: self.var_count,
                    header_var_count: header.var_count,
                });
            }
            if self.clause_count != header.clause_count {
                return Err(ParserError::ClauseCount {
                    clause_count: self.clause_count,
                    header_clause_count: header.clause_count,
                });
            }
        }
        Ok(())
    }

    /// The header of the parsed input if present.
    pub fn header(&self) -> Option<DimacsHeader> {
        self.header
    }

    /// Number of variables in the parsed formula so far.
    ///
    /// When a header is present, the header's variable count is an additional
    /// lower bound.
    pub fn var_count(&self) -> usize {
        match self.header {
            Some(header) => header.var_count.max(self.var_count),
            None => self.var_count,
        }
    }

    /// Number of clauses parsed so far.
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    /// Return the formula parsed so far and start an empty one.
    ///
    /// A partially parsed clause is kept in the parser and not returned.
    pub fn take_formula(&mut self) -> CnfFormula {
        replace(&mut self.formula, CnfFormula::new())
    }

    fn finish_literal(&mut self) {
        if !self.in_lit {
            return;
        }
        if self.partial_lit == 0 {
            self.clause_count += 1;
            let clause = replace(&mut self.partial_clause, vec![]);
            self.formula.add_clause(clause);
        } else {
            let index = self.partial_lit - 1;
            self.var_count = self.var_count.max(index + 1);
            self.partial_clause
                .push(Lit::from_index(index, !self.negate_next_lit));
        }
    }

    fn parse_header_line(&mut self) -> Result<(), ParserError> {
        let header_line = replace(&mut self.header_line, vec![]);

        let invalid_header = || ParserError::InvalidHeader {
            line: self.line_number.saturating_sub(1),
            header: String::from_utf8_lossy(&header_line).into_owned(),
        };

        let line = std::str::from_utf8(&header_line).map_err(|_| invalid_header())?;

        let mut fields = line.split_whitespace();

        if fields.next() != Some("p") || fields.next() != Some("cnf") {
            return Err(invalid_header());
        }

        let var_count: usize = fields
            .next()
            .and_then(|field| field.parse().ok())
            .ok_or_else(invalid_header)?;

        let clause_count: usize = fields
            .next()
            .and_then(|field| field.parse().ok())
            .ok_or_else(invalid_header)?;

        if fields.next().is_some() {
            return Err(invalid_header());
        }

        self.header = Some(DimacsHeader {
            var_count,
            clause_count,
        });

        Ok(())
    }
}

/// Write a formula in DIMACS CNF format, including a matching header.
pub fn write_dimacs(target: &mut impl io::Write, formula: &CnfFormula) -> io::Result<()> {
    writeln!(
        target,
        "p cnf {} {}",
        formula.var_count(),
        formula.len()
    )?;
    for clause in formula.iter() {
        write_dimacs_clause(target, clause)?;
    }
    Ok(())
}

/// Write a single zero-terminated clause line.
pub fn write_dimacs_clause(target: &mut impl io::Write, clause: &[Lit]) -> io::Result<()> {
    for &lit in clause.iter() {
        itoa::write(&mut *target, lit.to_dimacs())?;
        target.write_all(b" ")?;
    }
    target.write_all(b"0\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use tracsat_formula::{cnf::strategy::*, cnf_formula};

    #[test]
    fn parse_simple() {
        let input = b"c comment\np cnf 3 2\n1 -2 0\n2 3 0\n";
        let formula = DimacsParser::parse(&input[..]).unwrap();

        let expected = cnf_formula![
            1, -2;
            2, 3;
        ];

        assert_eq!(formula, expected);
    }

    #[test]
    fn parse_without_header() {
        let input = b"1 2 0\n-1 0\n";
        let formula = DimacsParser::parse(&input[..]).unwrap();
        assert_eq!(formula.len(), 2);
        assert_eq!(formula.var_count(), 2);
    }

    #[test]
    fn header_mismatch_is_an_error() {
        let input = b"p cnf 2 1\n1 2 0\n-1 0\n";
        assert!(DimacsParser::parse(&input[..]).is_err());
    }

    #[test]
    fn unterminated_clause_is_an_error() {
        let input = b"p cnf 2 1\n1 2\n";
        assert!(DimacsParser::parse(&input[..]).is_err());
    }

    #[test]
    fn garbage_is_an_error() {
        let input = b"p cnf 2 1\n1 x 0\n";
        assert!(DimacsParser::parse(&input[..]).is_err());
    }

    proptest! {
        #[test]
        fn roundtrip_through_dimacs(formula in cnf_formula(1..100usize, 0..500, 0..10)) {
            let mut written = vec![];
            write_dimacs(&mut written, &formula).unwrap();

            let mut parsed = DimacsParser::parse(&written[..]).unwrap();
            parsed.set_var_count(formula.var_count());

            prop_assert_eq!(parsed, formula);
        }

        #[test]
        fn chunked_parsing(formula in cnf_formula(1..100usize, 0..500, 0..10), chunk_size in 1..20usize) {
            let mut written = vec![];
            write_dimacs(&mut written, &formula).unwrap();

            let mut parser = DimacsParser::new();
            for chunk in written.chunks(chunk_size) {
                parser.parse_chunk(chunk).unwrap();
            }
            parser.eof().unwrap();
            parser.check_header().unwrap();

            let mut parsed = parser.take_formula();
            parsed.set_var_count(formula.var_count());

            prop_assert_eq!(parsed, formula);
        }
    }
}
