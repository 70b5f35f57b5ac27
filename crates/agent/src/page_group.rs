//! 페이지 그룹 규칙
//!
//! 정규식 규칙을 순서대로 평가해 처음 매칭된 규칙의 이름을 `h.pg`로 보냅니다.

use regex::Regex;
use tidemark_core::config::PageGroupRule;

use crate::error::AgentError;

/// 컴파일된 페이지 그룹 규칙 목록
#[derive(Debug, Clone, Default)]
pub struct PageGroups {
    rules: Vec<(Regex, String)>,
}

impl PageGroups {
    /// 규칙을 컴파일합니다.
    pub fn compile(rules: &[PageGroupRule]) -> Result<Self, AgentError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule.label.clone()))
                    .map_err(|e| AgentError::PageGroup {
                        pattern: rule.pattern.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// URL에 처음 매칭되는 그룹 이름
    pub fn classify(&self, url: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(url))
            .map(|(_, label)| label.as_str())
    }

    /// 규칙 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
