use std::{collections::VecDeque, path};

use log::{debug, trace};

use crate::{
    data::ParsedData,
    errors::ToResultSetsailError,
    load,
    sections::SectionManager,
    types::{KSLine, KSLineSource},
    SetsailError,
};

pub(crate) struct Parser {
    // parsed data
    pub data: ParsedData,

    // Configuration flags
    flag_include_fail_is_error: bool,
    flag_error_verbose: bool,

    // Inner state objects
    errors: Vec<SetsailError>,
    include_stack: Vec<path::PathBuf>,

    // Sections
    sectionmgr: SectionManager,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            data: ParsedData::default(),
            flag_include_fail_is_error: true,
            flag_error_verbose: false,
            errors: Vec::new(),
            include_stack: Vec::new(),
            sectionmgr: SectionManager::default(),
        }
    }

    pub fn include_fail_is_error(&mut self, error: bool) -> &mut Self {
        self.flag_include_fail_is_error = error;
        self
    }

    pub fn verbose_errors(&mut self, verbose: bool) -> &mut Self {
        self.flag_error_verbose = verbose;
        self
    }

    pub fn parse(&mut self, lines: &[KSLine]) {
        // Turn this into a queue so we can easily pop off the front
        let mut buf: VecDeque<KSLine> = lines.iter().cloned().collect();
        while let Some(line) = buf.pop_front() {
            if let Err(e) = self.parse_line_internal(line, &mut buf) {
                self.push_error(e);
            }
        }

        for warning in std::mem::take(&mut self.data.warnings) {
            self.push_error(warning);
        }
    }

    pub fn consume_errors(&mut self) -> Vec<SetsailError> {
        std::mem::take(&mut self.errors)
    }

    fn parse_line_internal(
        &mut self,
        line: KSLine,
        queue: &mut VecDeque<KSLine>,
    ) -> Result<(), SetsailError> {
        let tokens = shellwords::split(&line.raw).to_result_parser_error(&line)?;

        // Disregard empty lines and comments
        if tokens.is_empty() || tokens[0].starts_with('#') {
            return Ok(());
        }

        match tokens[0].as_str() {
            "%include" => match tokens.len() {
                2 => {
                    self.handle_include(line, &tokens[1]);
                }
                _ => {
                    return Err(SetsailError::new_syntax(
                        line,
                        "%include expects exactly 1 argument".into(),
                    ))
                }
            },

            "%end" => {
                return Err(SetsailError::new_syntax(
                    line,
                    "%end without a matching section".into(),
                ))
            }

            s if s.starts_with('%') => match self.sectionmgr.get_handler(s) {
                Some(handler) => {
                    let body = self.consume_section(&line, queue)?;
                    handler.handle(&mut self.data, line, tokens, body)?;
                }
                None => {
                    let section = tokens[0].clone();
                    return Err(SetsailError::new_syntax(
                        line,
                        format!("Unknown section: {section}"),
                    ));
                }
            },

            // Installer commands carry nothing for us
            _ => {
                trace!("Skipping line: {}", line);
            }
        };

        Ok(())
    }

    fn handle_include(&mut self, line: KSLine, filename: &str) {
        debug!("Including file: {}", filename);

        let mut path = path::PathBuf::from(filename);

        // A relative include inside an included file is relative to that file
        if path.is_relative() {
            if let Some(parent) = self.include_stack.last().and_then(|p| p.parent()) {
                path = parent.join(path);
                debug!("Updated relative path to: {}", path.display());
            }
        }

        if self.include_stack.contains(&path) {
            self.push_error(SetsailError::new_include(
                line,
                format!("Recursive include: {}", path.display()),
            ));
            return;
        }

        match load::load_to_kslines(&path, KSLineSource::new_include(path.clone(), &line)) {
            Err(e) => {
                if matches!(e.kind(), std::io::ErrorKind::NotFound)
                    && !self.flag_include_fail_is_error
                {
                    debug!("Skipping missing file: {}", path.display());
                    return;
                }
                self.push_error(SetsailError::new_include(line, e.to_string()))
            }
            Ok(newlines) => {
                self.include_stack.push(path);
                self.parse(&newlines);
                self.include_stack.pop();
            }
        }
    }

    fn consume_section(
        &self,
        opening: &KSLine,
        queue: &mut VecDeque<KSLine>,
    ) -> Result<Vec<String>, SetsailError> {
        let mut body = Vec::new();
        loop {
            let line = queue.pop_front().ok_or_else(|| {
                SetsailError::new_unexpected_eof(
                    opening.clone(),
                    "Section reached the end of the file".into(),
                )
            })?;

            match line.raw.split_whitespace().next() {
                Some("%end") => {
                    break;
                }

                // Another section opens before this one ended. Re-queue it so
                // it still gets parsed.
                Some(opener) if self.sectionmgr.is_known_section(opener) => {
                    queue.push_front(line.clone());
                    return Err(SetsailError::new_syntax(line, "Unexpected section".into()));
                }

                Some(_) | None => {
                    body.push(line.raw);
                }
            }
        }

        Ok(body)
    }

    fn push_error(&mut self, error: SetsailError) {
        error.log(self.flag_error_verbose);
        self.errors.push(error);
    }
}
