use super::*;

#[test]
fn default_template_has_both_slots() {
    let template = PromptTemplate::default();
    assert!(template.as_str().contains(QUESTION_PLACEHOLDER));
    assert!(template.as_str().contains(CONTEXT_PLACEHOLDER));
    assert_eq!(
        PromptTemplate::new(DEFAULT_PROMPT_TEMPLATE).expect("default is valid"),
        template
    );
}

#[test]
fn default_template_renders_arabic_prompt() {
    let prompt = PromptTemplate::default().render("ما هو الموضوع؟", "نص الوثيقة");

    assert_eq!(
        prompt,
        "حلل الوثائق التالية و افهمها جيدا ثم اجب عن السؤال التالي:\n\n\
         السؤال: ما هو الموضوع؟\n\n\
         الوثائق المتاحة: نص الوثيقة\n\n\
         الإجابة:"
    );
}

#[test]
fn templates_missing_a_slot_are_rejected() {
    for template in ["Only {question}", "Only {context}", "Neither", ""] {
        assert!(
            matches!(
                PromptTemplate::new(template),
                Err(ConfigError::InvalidPromptTemplate)
            ),
            "{template:?} should be rejected"
        );
    }
}

#[test]
fn custom_template_fills_every_occurrence() {
    let template = PromptTemplate::new("Q: {question}\nC: {context}\nAgain: {question}")
        .expect("template is valid");

    assert_eq!(
        template.render("why?", "because"),
        "Q: why?\nC: because\nAgain: why?"
    );
}

#[test]
fn placeholder_text_in_values_is_not_expanded() {
    let template = PromptTemplate::new("{question} | {context}").expect("template is valid");

    assert_eq!(
        template.render("what is {context}?", "see {question}"),
        "what is {context}? | see {question}"
    );
}

#[test]
fn empty_context_still_renders() {
    let template = PromptTemplate::new("Q={question};C={context};").expect("template is valid");
    assert_eq!(template.render("hello", ""), "Q=hello;C=;");
}
