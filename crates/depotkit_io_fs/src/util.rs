use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumScanPatternMode, ScanTreeError};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypeScanPatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SpecScanPatterns {
    pub(crate) patterns_include_files: Option<TypeScanPatternSeq>,
    pub(crate) patterns_exclude_files: Option<TypeScanPatternSeq>,
    pub(crate) patterns_exclude_dirs: Option<TypeScanPatternSeq>,
}

impl SpecScanPatterns {
    pub(crate) fn from_raw(
        patterns_include_files: Option<&[String]>,
        patterns_exclude_files: Option<&[String]>,
        patterns_exclude_dirs: Option<&[String]>,
        rule_pattern: EnumScanPatternMode,
        if_case_insensitive: bool,
    ) -> Result<Self, ScanTreeError> {
        Ok(Self {
            patterns_include_files: _compile(
                patterns_include_files,
                rule_pattern,
                if_case_insensitive,
            )?,
            patterns_exclude_files: _compile(
                patterns_exclude_files,
                rule_pattern,
                if_case_insensitive,
            )?,
            patterns_exclude_dirs: _compile(
                patterns_exclude_dirs,
                rule_pattern,
                if_case_insensitive,
            )?,
        })
    }
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumScanPatternMode,
    if_case_insensitive: bool,
) -> Result<Option<TypeScanPatternSeq>, ScanTreeError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumScanPatternMode::Literal => Ok(Some(TypeScanPatternSeq::Literal(patterns.to_vec()))),
        EnumScanPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = GlobBuilder::new(pattern)
                    .case_insensitive(if_case_insensitive)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| {
                        ScanTreeError::InvalidPattern(format!(
                            "Invalid pattern in include/exclude: {e}"
                        ))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypeScanPatternSeq::Glob(l_glob)))
        }
        EnumScanPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    ScanTreeError::InvalidPattern(format!(
                        "Invalid pattern in include/exclude: {e}"
                    ))
                })?;
                l_regex.push(regex);
            }
            Ok(Some(TypeScanPatternSeq::Regex(l_regex)))
        }
    }
}

fn _is_pattern_matching(value: &str, patterns: Option<&TypeScanPatternSeq>) -> bool {
    let Some(patterns) = patterns else {
        return false;
    };

    match patterns {
        TypeScanPatternSeq::Literal(v) => v.iter().any(|p| value.contains(p.as_str())),
        TypeScanPatternSeq::Glob(v) => v.iter().any(|p| p.is_match(value)),
        TypeScanPatternSeq::Regex(v) => v.iter().any(|p| p.is_match(value)),
    }
}

pub(crate) fn should_exclude_by_patterns(
    value: &str,
    patterns_include: Option<&TypeScanPatternSeq>,
    patterns_exclude: Option<&TypeScanPatternSeq>,
) -> bool {
    let b_included = match patterns_include {
        None => true,
        Some(_) => _is_pattern_matching(value, patterns_include),
    };
    !b_included || _is_pattern_matching(value, patterns_exclude)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DepthUtilities

pub(crate) fn is_depth_within_limit(depth_value: usize, depth_limit: Option<usize>) -> bool {
    match depth_limit {
        None => true,
        Some(limit) => depth_value <= limit,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
