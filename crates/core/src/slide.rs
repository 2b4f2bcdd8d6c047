use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single slide in the presentation.
///
/// Slides are immutable once appended to the deck and are identified only by
/// their position. `title` and `content` carry markdown; `background_image`
/// is a topical keyword (e.g. "dog"), not a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub title: String,
    pub content: String,
    pub background_image: String,
}

/// Everything needed to create and narrate one slide.
///
/// Both invocation gates convert their own argument shapes into this value
/// before handing it to the command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRequest {
    pub title: String,
    pub content: String,
    pub background_image: String,
    /// Narration spoken while the slide is on screen.
    pub speech: String,
}

impl SlideRequest {
    /// Splits the request into the slide to store and the text to narrate.
    pub fn into_parts(self) -> (Slide, String) {
        (
            Slide {
                title: self.title,
                content: self.content,
                background_image: self.background_image,
            },
            self.speech,
        )
    }
}

/// Arguments of the persistently registered `createNewPowerPointSlide` tool.
#[derive(Deserialize, JsonSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlideArgs {
    /// The topic to display in the presentation slide. Use simple markdown to outline your speech, like a headline.
    pub slide_title: String,
    /// The content to display in the presentation slide. Use simple markdown to outline your speech, like lists, paragraphs, etc.
    pub content: String,
    /// What to display in the background of the slide (i.e. 'dog' or 'house').
    pub background_image: String,
    /// An informative speech about the current slide.
    pub speech: String,
}

impl From<CreateSlideArgs> for SlideRequest {
    fn from(args: CreateSlideArgs) -> Self {
        Self {
            title: args.slide_title,
            content: args.content,
            background_image: args.background_image,
            speech: args.speech,
        }
    }
}

/// Arguments of the one-shot task's `newSlide` action.
#[derive(Deserialize, JsonSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewSlideArgs {
    /// The title to display in the presentation slide.
    pub title: String,
    /// The content to display in the presentation slide.
    pub content: String,
    /// What to display in the background of the slide (i.e. 'dog' or 'house').
    pub background_image: String,
    /// An informative speech about the current slide.
    pub speech: String,
}

impl From<NewSlideArgs> for SlideRequest {
    fn from(args: NewSlideArgs) -> Self {
        Self {
            title: args.title,
            content: args.content,
            background_image: args.background_image,
            speech: args.speech,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_serializes_with_camel_case_keys() {
        let slide = Slide {
            title: "Intro".into(),
            content: "Welcome".into(),
            background_image: "conference".into(),
        };
        let json = serde_json::to_value(&slide).unwrap();
        assert_eq!(json["backgroundImage"], "conference");
        assert!(json.get("background_image").is_none());
    }

    #[test]
    fn both_argument_shapes_produce_the_same_request() {
        let action: CreateSlideArgs = serde_json::from_str(
            r#"{"slideTitle":"A","content":"B","backgroundImage":"c","speech":"d"}"#,
        )
        .unwrap();
        let task: NewSlideArgs = serde_json::from_str(
            r#"{"title":"A","content":"B","backgroundImage":"c","speech":"d"}"#,
        )
        .unwrap();
        assert_eq!(SlideRequest::from(action), SlideRequest::from(task));
    }

    #[test]
    fn missing_argument_is_rejected() {
        let parsed = serde_json::from_str::<CreateSlideArgs>(
            r#"{"slideTitle":"A","content":"B","backgroundImage":"c"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn empty_strings_are_accepted() {
        let args: NewSlideArgs = serde_json::from_str(
            r#"{"title":"","content":"","backgroundImage":"","speech":""}"#,
        )
        .unwrap();
        let (slide, speech) = SlideRequest::from(args).into_parts();
        assert!(slide.title.is_empty());
        assert!(speech.is_empty());
    }
}
