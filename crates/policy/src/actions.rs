//! 액션 핸들러 — 규칙에 연결된 액션의 레지스트리와 디스패치
//!
//! 규칙은 액션을 이름으로 참조합니다. 매칭된 규칙의 액션은 워커
//! 컨텍스트에서 선언 순서대로 동기 실행됩니다. 액션 실패는 로그로
//! 남고 나머지 규칙 평가를 중단하지 않습니다.

use std::collections::HashMap;

use metrics::counter;

use flowsentry_core::metrics::{ENGINE_ACTION_ERRORS_TOTAL, LABEL_ACTION};
use flowsentry_core::record::Record;

use crate::error::PolicyError;
use crate::types::Rule;

/// 레코드에 대한 부수 효과를 수행하는 액션
pub trait Action: Send + Sync {
    /// 액션 이름 — 규칙의 `action` 목록에서 참조됩니다.
    fn name(&self) -> &str;

    /// 매칭된 레코드에 대해 액션을 실행합니다.
    fn run(&self, r: &mut Record) -> Result<(), PolicyError>;
}

/// 레코드 컨텍스트에 고정 태그를 추가하는 기본 액션
pub struct TagAction {
    tag: String,
}

impl TagAction {
    /// 지정한 태그를 추가하는 액션을 생성합니다.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Action for TagAction {
    fn name(&self) -> &str {
        "tag"
    }

    fn run(&self, r: &mut Record) -> Result<(), PolicyError> {
        r.ctx.add_tag(self.tag.clone());
        Ok(())
    }
}

/// 액션 레지스트리
#[derive(Default)]
pub struct ActionHandler {
    registry: HashMap<String, Box<dyn Action>>,
}

impl ActionHandler {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 액션을 등록합니다. 같은 이름의 기존 액션은 교체됩니다.
    pub fn register(&mut self, action: Box<dyn Action>) {
        self.registry.insert(action.name().to_owned(), action);
    }

    /// 등록된 액션 수
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// 규칙들이 참조하는 액션이 모두 등록되어 있는지 확인합니다.
    ///
    /// 없는 액션은 경고만 남깁니다. 해당 규칙이 매칭되어도 그 액션은
    /// 건너뜁니다.
    pub fn check_actions(&self, rules: &[Rule]) {
        for rule in rules {
            for action in &rule.actions {
                if !self.registry.contains_key(action) {
                    tracing::warn!(
                        rule = %rule.name,
                        action = %action,
                        "rule references unregistered action"
                    );
                }
            }
        }
    }

    /// 매칭된 규칙의 액션을 선언 순서대로 실행합니다.
    ///
    /// 실패한 액션은 로그와 카운터로 기록되고 다음 액션으로
    /// 진행합니다.
    pub fn handle(&self, rule: &Rule, r: &mut Record) {
        for name in &rule.actions {
            let Some(action) = self.registry.get(name) else {
                tracing::debug!(rule = %rule.name, action = %name, "skipping unregistered action");
                continue;
            };
            if let Err(e) = action.run(r) {
                counter!(ENGINE_ACTION_ERRORS_TOTAL, LABEL_ACTION => name.clone()).increment(1);
                tracing::warn!(rule = %rule.name, action = %name, error = %e, "action failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Criterion;
    use flowsentry_core::types::Priority;

    fn rule_with_actions(actions: Vec<String>) -> Rule {
        Rule {
            name: "r".to_owned(),
            desc: String::new(),
            condition: Criterion::always_true(),
            actions,
            tags: vec![],
            priority: Priority::Low,
            prefilter: vec![],
            enabled: true,
        }
    }

    struct FailingAction;

    impl Action for FailingAction {
        fn name(&self) -> &str {
            "fail"
        }

        fn run(&self, _r: &mut Record) -> Result<(), PolicyError> {
            Err(PolicyError::Action {
                action: "fail".to_owned(),
                reason: "always fails".to_owned(),
            })
        }
    }

    #[test]
    fn tag_action_adds_tag() {
        let mut handler = ActionHandler::new();
        handler.register(Box::new(TagAction::new("enriched")));

        let rule = rule_with_actions(vec!["tag".to_owned()]);
        let mut r = Record::new();
        handler.handle(&rule, &mut r);
        assert_eq!(r.ctx.tags(), &["enriched".to_owned()]);
    }

    #[test]
    fn failing_action_does_not_abort_others() {
        let mut handler = ActionHandler::new();
        handler.register(Box::new(FailingAction));
        handler.register(Box::new(TagAction::new("after-failure")));

        let rule = rule_with_actions(vec!["fail".to_owned(), "tag".to_owned()]);
        let mut r = Record::new();
        handler.handle(&rule, &mut r);
        // 실패한 액션 뒤의 액션도 실행됩니다
        assert_eq!(r.ctx.tags(), &["after-failure".to_owned()]);
    }

    #[test]
    fn unregistered_action_is_skipped() {
        let handler = ActionHandler::new();
        let rule = rule_with_actions(vec!["missing".to_owned()]);
        let mut r = Record::new();
        handler.handle(&rule, &mut r);
        assert!(r.ctx.tags().is_empty());
    }

    #[test]
    fn check_actions_accepts_registered() {
        let mut handler = ActionHandler::new();
        handler.register(Box::new(TagAction::new("t")));
        let rules = vec![rule_with_actions(vec!["tag".to_owned()])];
        // 경고만 남기므로 패닉 없이 통과해야 합니다
        handler.check_actions(&rules);
    }
}
