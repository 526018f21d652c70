use crate::config::ValidationMessages;
use crate::dom::Dom;
use crate::errors::ValidationError;
use crate::models::{ElementId, FieldSpec, FieldType, ValidationResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::rc::Rc;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

pub const ERROR_CLASSES: &str = "border-red-500 bg-red-50";
pub const ERROR_MESSAGE_CLASS: &str = "error-message";
const ERROR_MESSAGE_CLASSES: &str = "error-message text-sm text-red-600 mt-1";
const FIELD_TAGS: [&str; 3] = ["input", "textarea", "select"];

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn check_value(spec: &FieldSpec, raw: &str) -> Result<(), ValidationError> {
    let value = raw.trim();
    if spec.required && value.is_empty() {
        return Err(ValidationError::MissingRequiredField);
    }
    if spec.kind == FieldType::Email && !value.is_empty() && !is_valid_email(value) {
        return Err(ValidationError::InvalidEmailFormat);
    }
    Ok(())
}

pub fn field_spec(dom: &dyn Dom, field: ElementId) -> FieldSpec {
    FieldSpec {
        required: dom.has_attribute(field, "required"),
        kind: FieldType::parse(dom.attribute(field, "type").as_deref()),
    }
}

pub fn is_field(dom: &dyn Dom, el: ElementId) -> bool {
    dom.tag(el)
        .is_some_and(|tag| FIELD_TAGS.contains(&tag.as_str()))
}

pub struct FormValidator {
    dom: Rc<dyn Dom>,
    messages: ValidationMessages,
}

impl FormValidator {
    pub fn new(dom: Rc<dyn Dom>, messages: ValidationMessages) -> Self {
        Self { dom, messages }
    }

    pub fn message_for(&self, error: ValidationError) -> &str {
        match error {
            ValidationError::MissingRequiredField => &self.messages.required,
            ValidationError::InvalidEmailFormat => &self.messages.email,
        }
    }

    pub fn validate_field(&self, field: ElementId) -> ValidationResult {
        self.clear_field_error(field);

        let spec = field_spec(self.dom.as_ref(), field);
        let error = check_value(&spec, &self.dom.value(field)).err();
        let message = error
            .map(|error| self.message_for(error).to_string())
            .unwrap_or_default();
        if error.is_some() {
            self.show_field_error(field, &message);
        }

        ValidationResult {
            field,
            error,
            message,
        }
    }

    /// Checks every constrained field in the form so all errors show at once.
    pub fn validate_form(&self, form: ElementId) -> Vec<ValidationResult> {
        self.constrained_fields(form)
            .into_iter()
            .map(|field| self.validate_field(field))
            .collect()
    }

    pub fn constrained_fields(&self, form: ElementId) -> Vec<ElementId> {
        let dom = self.dom.as_ref();
        self.fields(form)
            .into_iter()
            .filter(|field| field_spec(dom, *field).is_constrained())
            .collect()
    }

    pub fn fields(&self, form: ElementId) -> Vec<ElementId> {
        let dom = self.dom.as_ref();
        dom.descendants(form)
            .into_iter()
            .filter(|el| is_field(dom, *el))
            .collect()
    }

    /// The message renders directly after its field, so fields sharing a
    /// parent each keep their own.
    pub fn show_field_error(&self, field: ElementId, message: &str) {
        let dom = self.dom.as_ref();
        dom.add_classes(field, ERROR_CLASSES);

        let Some(parent) = dom.parent(field) else {
            return;
        };
        let error_el = match self.message_element(field) {
            Some(el) => el,
            None => {
                let el = dom.create_element("p");
                dom.set_class_name(el, ERROR_MESSAGE_CLASSES);
                match dom.next_sibling(field) {
                    Some(next) => dom.insert_before(parent, el, next),
                    None => dom.append_child(parent, el),
                }
                el
            }
        };
        dom.set_text(error_el, message);
    }

    pub fn clear_field_error(&self, field: ElementId) {
        self.dom.remove_classes(field, ERROR_CLASSES);
        if let Some(el) = self.message_element(field) {
            self.dom.remove(el);
        }
    }

    pub fn error_message(&self, field: ElementId) -> Option<String> {
        self.message_element(field).map(|el| self.dom.text(el))
    }

    fn message_element(&self, field: ElementId) -> Option<ElementId> {
        self.dom
            .next_sibling(field)
            .filter(|el| self.dom.has_class(*el, ERROR_MESSAGE_CLASS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    const REQUIRED: FieldSpec = FieldSpec {
        required: true,
        kind: FieldType::Text,
    };
    const EMAIL: FieldSpec = FieldSpec {
        required: false,
        kind: FieldType::Email,
    };

    #[test]
    fn required_rejects_blank_values() {
        assert_eq!(check_value(&REQUIRED, ""), Err(ValidationError::MissingRequiredField));
        assert_eq!(check_value(&REQUIRED, "  \t "), Err(ValidationError::MissingRequiredField));
        assert_eq!(check_value(&REQUIRED, " Ada "), Ok(()));
    }

    #[test]
    fn email_format() {
        assert_eq!(check_value(&EMAIL, "a@b.co"), Ok(()));
        assert_eq!(check_value(&EMAIL, "a@b"), Err(ValidationError::InvalidEmailFormat));
        assert_eq!(check_value(&EMAIL, "a"), Err(ValidationError::InvalidEmailFormat));
        assert_eq!(check_value(&EMAIL, "a b@c.de"), Err(ValidationError::InvalidEmailFormat));
        // Optional and empty is fine; required and empty is a missing field.
        assert_eq!(check_value(&EMAIL, ""), Ok(()));
        let required_email = FieldSpec {
            required: true,
            kind: FieldType::Email,
        };
        assert_eq!(
            check_value(&required_email, ""),
            Err(ValidationError::MissingRequiredField)
        );
    }

    fn form_with_fields() -> (Rc<MemoryDom>, ElementId, ElementId, ElementId) {
        let dom = Rc::new(MemoryDom::default());
        let form = dom.element_with_id(dom.root(), "form", "contact-form");
        let name_row = dom.element(form, "div");
        let name = dom.element(name_row, "input");
        dom.set_attribute(name, "required", "");
        let email_row = dom.element(form, "div");
        let email = dom.element(email_row, "input");
        dom.set_attribute(email, "type", "email");
        dom.set_attribute(email, "required", "");
        let notes_row = dom.element(form, "div");
        dom.element(notes_row, "textarea");
        (dom, form, name, email)
    }

    #[test]
    fn failing_field_gets_styling_and_single_message() {
        let (dom, _, name, _) = form_with_fields();
        let validator = FormValidator::new(dom.clone(), ValidationMessages::default());

        let result = validator.validate_field(name);
        assert_eq!(result.error, Some(ValidationError::MissingRequiredField));
        validator.validate_field(name);

        assert!(dom.has_class(name, "border-red-500"));
        let row = dom.parent(name).unwrap();
        let messages: Vec<_> = dom
            .children(row)
            .into_iter()
            .filter(|el| dom.has_class(*el, ERROR_MESSAGE_CLASS))
            .collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(validator.error_message(name).as_deref(), Some("This field is required"));
    }

    #[test]
    fn fixing_a_field_clears_feedback() {
        let (dom, _, _, email) = form_with_fields();
        let validator = FormValidator::new(dom.clone(), ValidationMessages::default());
        dom.set_value(email, "not-an-address");
        assert!(!validator.validate_field(email).is_valid());
        assert_eq!(
            validator.error_message(email).as_deref(),
            Some("Please enter a valid email address")
        );

        dom.set_value(email, "ada@example.org");
        assert!(validator.validate_field(email).is_valid());
        assert!(!dom.has_class(email, "bg-red-50"));
        assert_eq!(validator.error_message(email), None);
    }

    #[test]
    fn form_validation_reports_every_failure() {
        let (dom, form, name, email) = form_with_fields();
        let validator = FormValidator::new(dom.clone(), ValidationMessages::default());
        dom.set_value(email, "bad");

        let results = validator.validate_form(form);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|result| !result.is_valid()));
        assert!(validator.error_message(name).is_some());
        assert!(validator.error_message(email).is_some());
    }

    #[test]
    fn fields_sharing_a_parent_keep_their_own_messages() {
        let dom = Rc::new(MemoryDom::default());
        let form = dom.element(dom.root(), "form");
        let name = dom.element(form, "input");
        dom.set_attribute(name, "required", "");
        let email = dom.element(form, "input");
        dom.set_attribute(email, "type", "email");
        dom.set_attribute(email, "required", "");
        let validator = FormValidator::new(dom.clone(), ValidationMessages::default());

        dom.set_value(email, "bad");
        let results = validator.validate_form(form);
        assert_eq!(results.iter().filter(|r| !r.is_valid()).count(), 2);

        let rendered = dom
            .children(form)
            .into_iter()
            .filter(|el| dom.has_class(*el, ERROR_MESSAGE_CLASS))
            .count();
        assert_eq!(rendered, 2);
        assert_eq!(validator.error_message(name).as_deref(), Some("This field is required"));
        assert_eq!(
            validator.error_message(email).as_deref(),
            Some("Please enter a valid email address")
        );

        validator.clear_field_error(name);
        assert_eq!(validator.error_message(name), None);
        assert!(validator.error_message(email).is_some());
    }

    #[test]
    fn custom_messages_are_rendered() {
        let (dom, _, name, _) = form_with_fields();
        let messages = ValidationMessages {
            required: "Bitte ausfüllen".to_string(),
            ..ValidationMessages::default()
        };
        let validator = FormValidator::new(dom.clone(), messages);
        validator.validate_field(name);
        assert_eq!(validator.error_message(name).as_deref(), Some("Bitte ausfüllen"));
    }
}
