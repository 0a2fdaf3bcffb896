//! Prompt text shared by the generation call sites.

pub fn system_prompt() -> &'static str {
    r#"You are a research assistant helping to analyze information and generate insights.

When asked to return JSON, return ONLY the JSON object without any markdown formatting, code blocks, or additional text.

For example, if asked to return a JSON object with questions, respond with just:
{
  "questions": ["question 1", "question 2"]
}

NOT with:
```json
{
  "questions": ["question 1", "question 2"]
}
```

Always return raw JSON without any formatting or explanation."#
}

pub fn query_plan(topic: &str, learnings: &[String], num_queries: usize) -> String {
    let previous = if learnings.is_empty() {
        String::new()
    } else {
        format!("Previous learnings:\n{}\n", bullets(learnings))
    };
    format!(
        r#"Generate {num_queries} search queries to research this topic. Return them in the exact JSON format shown below.

Topic: "{topic}"
{previous}
Required JSON format:
{{
  "queries": [
    {{
      "query": "example search query 1",
      "researchGoal": "goal and additional research directions for query 1"
    }},
    {{
      "query": "example search query 2",
      "researchGoal": "goal and additional research directions for query 2"
    }}
  ]
}}"#
    )
}

pub fn synthesis(
    query: &str,
    contents: &str,
    num_learnings: usize,
    num_follow_ups: usize,
) -> String {
    format!(
        r#"Analyze the search results for "{query}" and generate {num_learnings} key learnings and {num_follow_ups} follow-up questions. Return them in the exact JSON format shown below.

Search Results:
{contents}

Required JSON format:
{{
  "learnings": [
    "First key learning point about the topic",
    "Second key learning point about the topic",
    "Third key learning point about the topic"
  ],
  "followUpQuestions": [
    "First follow-up question to explore further",
    "Second follow-up question to explore further",
    "Third follow-up question to explore further"
  ]
}}"#
    )
}

pub fn final_report(prompt: &str, learnings: &[String]) -> String {
    format!(
        r##"Given the following prompt from the user, write a final report on the topic using the learnings from research. Return the report in the exact JSON format shown below. Use \n for newlines in the markdown.

Prompt: "{prompt}"

Learnings from research:
{}

Required JSON format:
{{
  "reportMarkdown": "# Research Report\n\n## Summary\n\nThis is an example summary...\n\n## Key Findings\n\n1. First finding\n2. Second finding"
}}"##,
        numbered(learnings)
    )
}

pub fn clarifying_questions(query: &str, num_questions: usize) -> String {
    format!(
        r#"Given the following query from the user, generate {num_questions} follow-up questions to clarify the research direction. Format your response as a JSON object with a "questions" array containing the questions as strings.

Query: "{query}"

Example response format:
{{
  "questions": [
    "What specific aspects of this topic interest you most?",
    "Are you looking for current developments or historical context?",
    "What is your intended use case for this information?"
  ]
}}"#
    )
}

/// Query for the next recursion level of a branch.
pub fn next_level_query(research_goal: &str, follow_ups: &[String]) -> String {
    let directions: String = follow_ups.iter().map(|q| format!("\n{q}")).collect();
    format!("Previous research goal: {research_goal}\nFollow-up research directions: {directions}")
        .trim()
        .to_string()
}

pub fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {s}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_prompt_mentions_learnings_only_when_present() {
        let p = query_plan("rust async", &[], 3);
        assert!(p.starts_with("Generate 3 search queries"));
        assert!(!p.contains("Previous learnings"));
        let p = query_plan("rust async", &["tokio is popular".to_string()], 2);
        assert!(p.contains("Previous learnings:\n- tokio is popular"));
    }

    #[test]
    fn report_prompt_keeps_escaped_newlines_literal() {
        let p = final_report("topic", &["a".into(), "b".into()]);
        assert!(p.contains("1. a\n2. b"));
        assert!(p.contains(r"# Research Report\n\n## Summary"));
        assert!(p.contains("Prompt: \"topic\""));
        assert!(p.ends_with(r#"2. Second finding"
}"#));
    }

    #[test]
    fn next_level_query_lists_each_direction_on_its_own_line() {
        let q = next_level_query("goal", &["q1?".into(), "q2?".into()]);
        assert_eq!(
            q,
            "Previous research goal: goal\nFollow-up research directions: \nq1?\nq2?"
        );
    }
}
