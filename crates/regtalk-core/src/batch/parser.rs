//! Batch parser
//!
//! Grammar: tokens separated by `;`, surrounding whitespace trimmed, empty
//! tokens ignored. Tokens are tried in this order:
//!
//! 1. `#text`          comment
//! 2. `delay=<secs>`   pause
//! 3. `cont`           continuous flag
//! 4. alias name       expanded in place (case-insensitive)
//! 5. batch file name  expanded in place (`name` or `name.txt`)
//! 6. `r <hex>`        read
//! 7. `w <hex> <hex>`  write
//!
//! Hex fields are 1-4 digits. Anything else rejects the whole batch.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use super::{AliasTable, Batch, BatchError, Command, FileResolver};

/// Maximum depth of nested alias/file expansion
pub const MAX_EXPANSION_DEPTH: usize = 16;

fn read_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[rR]\s+([0-9A-Fa-f]{1,4})$").unwrap())
}

fn write_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[wW]\s+([0-9A-Fa-f]{1,4})\s+([0-9A-Fa-f]{1,4})$").unwrap()
    })
}

/// Context for alias/file expansion
struct ExpansionContext<'a> {
    aliases: &'a AliasTable,
    resolver: &'a dyn FileResolver,
    /// Aliases and files currently being expanded, outermost first
    chain: Vec<String>,
}

impl ExpansionContext<'_> {
    /// Push an expansion onto the chain, rejecting re-entry and runaway depth
    fn enter(&mut self, key: String, token: &str) -> Result<(), BatchError> {
        if self.chain.len() >= MAX_EXPANSION_DEPTH || self.chain.contains(&key) {
            let mut chain = self.chain.clone();
            chain.push(key);
            return Err(BatchError::AliasFileCycle {
                name: token.to_string(),
                chain: chain.join(" -> "),
            });
        }
        self.chain.push(key);
        Ok(())
    }

    fn leave(&mut self) {
        self.chain.pop();
    }
}

/// Parse a batch of commands.
///
/// Returns the complete batch or an error; a batch is never returned partially
/// parsed.
pub fn parse(
    text: &str,
    aliases: &AliasTable,
    resolver: &dyn FileResolver,
) -> Result<Batch, BatchError> {
    let mut ctx = ExpansionContext {
        aliases,
        resolver,
        chain: Vec::new(),
    };
    let mut batch = Batch::default();
    parse_into(text, &mut ctx, &mut batch)?;
    Ok(batch)
}

fn parse_into(
    text: &str,
    ctx: &mut ExpansionContext<'_>,
    batch: &mut Batch,
) -> Result<(), BatchError> {
    for token in text.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        parse_token(token, ctx, batch)?;
    }
    Ok(())
}

fn parse_token(
    token: &str,
    ctx: &mut ExpansionContext<'_>,
    batch: &mut Batch,
) -> Result<(), BatchError> {
    if let Some(text) = token.strip_prefix('#') {
        batch.push(Command::Comment {
            text: text.trim().to_string(),
        });
        return Ok(());
    }

    if let Some(seconds) = parse_delay(token)? {
        batch.push(Command::Delay { seconds });
        return Ok(());
    }

    if token.eq_ignore_ascii_case("cont") {
        batch.push(Command::Continuous);
        return Ok(());
    }

    if let Some(expansion) = ctx.aliases.get(token) {
        let expansion = expansion.to_string();
        ctx.enter(format!("alias:{}", token.to_ascii_lowercase()), token)?;
        parse_into(&expansion, ctx, batch)?;
        ctx.leave();
        return Ok(());
    }

    if let Some(file) = ctx.resolver.resolve(token)? {
        ctx.enter(format!("file:{}", file.key), token)?;
        // Lines in a batch file separate commands just like ';'
        let contents = file.contents.replace(['\r', '\n'], ";");
        parse_into(&contents, ctx, batch)?;
        ctx.leave();
        return Ok(());
    }

    if let Some(caps) = read_re().captures(token) {
        let address = parse_hex(&caps[1], token)?;
        batch.push(Command::Read { address });
        return Ok(());
    }

    if let Some(caps) = write_re().captures(token) {
        let address = parse_hex(&caps[1], token)?;
        let value = parse_hex(&caps[2], token)?;
        batch.push(Command::Write { address, value });
        return Ok(());
    }

    Err(BatchError::BadToken(token.to_string()))
}

/// `delay=<float>`; `Ok(None)` if the token is not a delay at all
fn parse_delay(token: &str) -> Result<Option<f64>, BatchError> {
    let Some((key, value)) = token.split_once('=') else {
        return Ok(None);
    };
    if !key.trim().eq_ignore_ascii_case("delay") {
        return Ok(None);
    }

    // Must be finite, non-negative and fit in a Duration
    match value.trim().parse::<f64>() {
        Ok(seconds) if Duration::try_from_secs_f64(seconds).is_ok() => Ok(Some(seconds)),
        _ => Err(BatchError::BadToken(token.to_string())),
    }
}

fn parse_hex(digits: &str, token: &str) -> Result<u16, BatchError> {
    u16::from_str_radix(digits, 16).map_err(|_| BatchError::BadToken(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{NoFiles, ResolvedFile};
    use std::collections::HashMap;

    /// Resolver backed by an in-memory map
    struct MapResolver(HashMap<&'static str, &'static str>);

    impl FileResolver for MapResolver {
        fn resolve(&self, name: &str) -> Result<Option<ResolvedFile>, BatchError> {
            Ok(self.0.get(name).map(|contents| ResolvedFile {
                key: name.to_string(),
                contents: contents.to_string(),
            }))
        }
    }

    fn parse_plain(text: &str) -> Result<Batch, BatchError> {
        parse(text, &AliasTable::new(), &NoFiles)
    }

    #[test]
    fn test_read_and_write() {
        let batch = parse_plain("r 1; w 1000 abcd;").unwrap();
        assert_eq!(
            batch.commands(),
            &[
                Command::Read { address: 0x1 },
                Command::Write {
                    address: 0x1000,
                    value: 0xABCD
                },
            ]
        );
        assert!(!batch.is_continuous());
    }

    #[test]
    fn test_bad_token_rejects_whole_batch() {
        let err = parse_plain("r 1; w ZZ 2").unwrap_err();
        assert_eq!(err, BatchError::BadToken("w ZZ 2".into()));
    }

    #[test]
    fn test_hex_width_limits() {
        assert!(parse_plain("r 12345").is_err());
        assert!(parse_plain("r").is_err());
        assert!(parse_plain("w 1 2 3").is_err());
        assert!(parse_plain("r 0x10").is_err());
        assert!(parse_plain("R FFFF").is_ok());
    }

    #[test]
    fn test_delay_cont_and_comment() {
        let batch = parse_plain("#warm up; delay=0.5; cont; r 2").unwrap();
        assert_eq!(
            batch.commands(),
            &[Command::Delay { seconds: 0.5 }, Command::Read { address: 2 }]
        );
        assert!(batch.is_continuous());
        assert_eq!(batch.comments(), &["warm up".to_string()]);
    }

    #[test]
    fn test_bad_delay() {
        assert!(parse_plain("delay=abc").is_err());
        assert!(parse_plain("delay=-1").is_err());
        assert!(parse_plain("delay=inf").is_err());
    }

    #[test]
    fn test_empty_and_trailing_separators() {
        assert!(parse_plain("").unwrap().is_empty());
        assert_eq!(parse_plain(" r 1 ;; r 2 ; ").unwrap().len(), 2);
    }

    #[test]
    fn test_alias_expansion_is_case_insensitive() {
        let aliases: AliasTable = [("Status", "r 602b; r 602c")].into_iter().collect();
        let batch = parse("w 1 1; STATUS", &aliases, &NoFiles).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.commands()[1], Command::Read { address: 0x602B });
    }

    #[test]
    fn test_alias_used_twice_is_not_a_cycle() {
        let aliases: AliasTable = [("s", "r 1")].into_iter().collect();
        assert_eq!(parse("s; s", &aliases, &NoFiles).unwrap().len(), 2);
    }

    #[test]
    fn test_alias_cycle_detected() {
        let aliases: AliasTable = [("a", "r 1; b"), ("b", "A")].into_iter().collect();
        let err = parse("a", &aliases, &NoFiles).unwrap_err();
        assert!(matches!(err, BatchError::AliasFileCycle { .. }));
    }

    #[test]
    fn test_self_alias_detected() {
        let aliases: AliasTable = [("loop", "loop")].into_iter().collect();
        assert!(matches!(
            parse("loop", &aliases, &NoFiles),
            Err(BatchError::AliasFileCycle { .. })
        ));
    }

    #[test]
    fn test_depth_bound() {
        // a0 -> a1 -> ... -> a20, no repeats but deeper than the bound
        let aliases: AliasTable = (0..20)
            .map(|i| (format!("a{}", i), format!("a{}", i + 1)))
            .chain([("a20".to_string(), "r 1".to_string())])
            .collect();
        assert!(matches!(
            parse("a0", &aliases, &NoFiles),
            Err(BatchError::AliasFileCycle { .. })
        ));
    }

    #[test]
    fn test_file_expansion_with_lines() {
        let resolver = MapResolver(HashMap::from([("setup", "# setup\nw 10 1\nr 10;\n")]));
        let batch = parse("setup; r 11", &AliasTable::new(), &resolver).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.comments(), &["setup".to_string()]);
    }

    #[test]
    fn test_alias_wins_over_file() {
        let aliases: AliasTable = [("setup", "r 99")].into_iter().collect();
        let resolver = MapResolver(HashMap::from([("setup", "r 1")]));
        let batch = parse("setup", &aliases, &resolver).unwrap();
        assert_eq!(batch.commands(), &[Command::Read { address: 0x99 }]);
    }

    #[test]
    fn test_file_cycle_detected() {
        let resolver = MapResolver(HashMap::from([("one", "two"), ("two", "r 1; one")]));
        assert!(matches!(
            parse("one", &AliasTable::new(), &resolver),
            Err(BatchError::AliasFileCycle { .. })
        ));
    }

    #[test]
    fn test_cont_inside_alias_sets_flag() {
        let aliases: AliasTable = [("poll", "r 1; cont")].into_iter().collect();
        assert!(parse("poll", &aliases, &NoFiles).unwrap().is_continuous());
    }
}
