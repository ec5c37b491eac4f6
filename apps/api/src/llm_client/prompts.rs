// Prompt text for resume analysis.

/// System prompt: the agent is a recruiter that answers with one JSON object
/// matching `AgentVerdict`.
pub const ANALYSIS_SYSTEM: &str = "You are an experienced technical recruiter. \
    Compare the candidate's resume against the job and respond with valid JSON only, \
    no markdown code fences and no text outside the JSON object. \
    Use exactly this schema: \
    {\"candidate_name\": string, \
    \"candidate_email\": string or null, \
    \"match_score\": number between 0 and 100, \
    \"relevant_skills\": [string], \
    \"missing_skills\": [string], \
    \"summary\": string, \
    \"recommendation\": string}. \
    Base every field on the resume text only. If a value is not present in the resume, \
    use an empty string or an empty list; never invent one.";

/// User prompt for one resume.
pub fn build_analysis_prompt(job_title: &str, job_description: &str, resume_text: &str) -> String {
    format!(
        "Job Title:\n{job_title}\n\nJob Description:\n{job_description}\n\nResume:\n{resume_text}"
    )
}
