//! Instruction templates for the vision backends.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the expected output schema or
//!    adding a rule requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the interpolated prompt
//!    directly without a live backend, so schema regressions are caught
//!    before they cost API calls.

/// Instruction template for per-page question extraction.
///
/// The `<syllabus_content>` placeholder is replaced with the structured
/// syllabus text via [`extraction_prompt`] before submission.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Please extract all MCQ questions and their options from the image provided.
Ensure you include answers and explanations for each question where possible.

Also, categorize each question under the appropriate topic and sub-topic based on the provided syllabus.

The syllabus is as follows:
<syllabus_content>

The expected JSON output format is:
{
  "questions": [
    {
      "question_no": <int>,
      "question": "<str>",
      "options": {
        "a": "<str>",
        "b": "<str>",
        "c": "<str>",
        "d": "<str>"
      },
      "answer": "<str>",
      "explanation": "<str>",
      "category": {
        "unit": "<unit_name>",
        "topic": "<topic_name>"
      }
    }
  ]
}

Key Points:
- Include all questions present in the image.
- Ensure each question has four options (a, b, c, d).
- Provide the answer and explanation for each question.
- Categorize each question into its corresponding unit and topic based on the syllabus.
- If no questions are present in the image, return {"questions": []}.
- Deliver the output in valid JSON format."#;

/// Instruction template for converting raw syllabus text into the
/// hierarchical unit → topic → sub-topic JSON tree.
///
/// The `<syllabus_text>` placeholder is replaced via [`syllabus_prompt`].
pub const SYLLABUS_PROMPT_TEMPLATE: &str = r#"The following text contains a syllabus for a subject. Please analyze and structure the content into a clean and hierarchical JSON format for better usability.

The JSON structure should adhere to the following format:
{
  "units": [
    {
      "unit_no": <int>,
      "unit_name": "<str>",
      "topics": [
        {
          "topic_name": "<str>",
          "sub_topics": ["<str>", "<str>", ...]
        }
      ]
    }
  ]
}

Key Requirements:
1. Extract all units, topics, and sub-topics.
2. Remove unnecessary formatting artifacts like page numbers or headers.
3. Ensure valid JSON output.

Here is the syllabus content:
<syllabus_text>

Provide the output in valid JSON format without additional comments."#;

/// The literal payload recorded for a page the backend refused to transcribe.
///
/// Written fenced so the post-run parse counts the page as zero questions
/// instead of silently dropping it.
pub const EMPTY_QUESTIONS_PAYLOAD: &str = "```json\n{\"questions\": []}\n```";

/// Interpolate the syllabus content into the extraction template.
pub fn extraction_prompt(syllabus_content: &str) -> String {
    EXTRACTION_PROMPT_TEMPLATE.replace("<syllabus_content>", syllabus_content)
}

/// Interpolate the raw syllabus text into the structuring template.
pub fn syllabus_prompt(syllabus_text: &str) -> String {
    SYLLABUS_PROMPT_TEMPLATE.replace("<syllabus_text>", syllabus_text)
}
