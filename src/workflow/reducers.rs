//! Pure state-update helpers shared by multiple nodes, kept separate from
//! node dispatch so the update logic itself is trivially unit-testable.

use crate::models::{Level, Question, Session};

/// Pops the next question to ask: drains the current level's pool first,
/// then cascades to the next level when it runs dry (§4.3.2 level order).
pub fn pop_next_question(session: &mut Session) -> Option<Question> {
    loop {
        if let Some(pool) = session.question_pool.get_mut(&session.current_level) {
            if let Some(question) = pool.pop() {
                return Some(question);
            }
        }
        match session.current_level.next() {
            Some(next) => session.current_level = next,
            None => return None,
        }
    }
}

/// Whether any question remains anywhere in the pool, at the current level
/// or beyond — used by `transition_level` to decide between asking another
/// question and moving on to report generation.
pub fn has_more_questions(session: &Session) -> bool {
    let mut level = Some(session.current_level);
    while let Some(current) = level {
        if session
            .question_pool
            .get(&current)
            .map(|pool| !pool.is_empty())
            .unwrap_or(false)
        {
            return true;
        }
        level = current.next();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateDescriptor;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn question(id: &str, level: Level) -> Question {
        Question {
            id: id.to_string(),
            level,
            text: format!("question {id}"),
            grounding_context: String::new(),
            expected_points: vec![],
            slide_reference: None,
        }
    }

    fn sample_session() -> Session {
        Session::new(
            "s1",
            "room1",
            CandidateDescriptor {
                id: "c1".into(),
                display_name: "Ada".into(),
            },
            "Project X",
            None,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn cascades_to_next_level_when_current_exhausted() {
        let mut session = sample_session();
        session.current_level = Level::Easy;
        session.question_pool = BTreeMap::from([
            (Level::Easy, vec![]),
            (Level::Medium, vec![question("m1", Level::Medium)]),
        ]);

        assert!(has_more_questions(&session));
        let next = pop_next_question(&mut session).unwrap();
        assert_eq!(next.id, "m1");
        assert_eq!(session.current_level, Level::Medium);
    }

    #[test]
    fn no_more_questions_past_hard() {
        let mut session = sample_session();
        session.current_level = Level::Hard;
        session.question_pool = BTreeMap::from([(Level::Hard, vec![])]);
        assert!(!has_more_questions(&session));
        assert!(pop_next_question(&mut session).is_none());
    }
}
