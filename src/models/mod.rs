pub mod annotation;
pub mod patch;
pub mod score;
pub mod survey;

pub use annotation::{
    Annotation, AnnotationKind, AnnotationRef, ComplianceReport, ComplianceStatus, EntityRef,
    PillarScores, QuestionAnnotation, Rating, SectionAnnotation, SurveyLevelAnnotation,
};
pub use patch::{QuestionPatch, SectionDraft, SectionMetadata, SectionPatch};
pub use score::{
    EvaluationStatus, PillarBreakdown, PillarScoreSnapshot, ReportedOutcome, ScoreState,
};
pub use survey::{
    Question, QuestionScope, QuestionType, Section, SectionId, SourceDocument, Survey,
    SurveyLayout, TextBlock,
};
