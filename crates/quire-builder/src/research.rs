//! The built-in research workflow.
//!
//! Summarizes every input paper, then derives related work, research gaps,
//! questions, hypotheses, a methodology, a system design, experiments, their
//! analysis, an abstract and references, and finally writes the paper as
//! markdown.

use quire_config::{
  ArtifactFormat, BatchDef, GroupDef, ItemsDef, MemberDef, StageDef, StepDef, WorkflowDef,
};

const PAPER_SUMMARIZER: &str = "Paper Summarizer Agent";
const RELATED_WORK: &str = "Related Work Synthesizer Agent";
const GAP_IDENTIFIER: &str = "Gap Identifier Agent";
const QUESTION_GENERATOR: &str = "Research Question Generator Agent";
const HYPOTHESIS_GENERATOR: &str = "Hypothesis Generator Agent";
const METHODOLOGY_PLANNER: &str = "Methodology Planner Agent";
const SYSTEM_DESIGNER: &str = "System Design Agent";
const EXPERIMENT_CONDUCTOR: &str = "Experiment Conductor Agent";
const RESULTS_ANALYZER: &str = "Results Analyzer Agent";
const ABSTRACT_GENERATOR: &str = "Abstract Generator Agent";
const REFERENCE_GENERATOR: &str = "Reference Generator Agent";
const PAPER_WRITER: &str = "Paper Writer Agent";

fn step(name: &str, worker: &str, inputs: &[(&str, &str)]) -> StepDef {
  StepDef {
    name: name.to_string(),
    worker: worker.to_string(),
    from: None,
    inputs: inputs
      .iter()
      .map(|(field, source)| (field.to_string(), source.to_string()))
      .collect(),
    format: ArtifactFormat::Json,
  }
}

/// The research workflow: eleven stages from paper summaries to a markdown
/// paper.
pub fn research_workflow() -> WorkflowDef {
  let mut paper = step(
    "paper",
    PAPER_WRITER,
    &[
      ("abstract", "abstract"),
      ("related_work", "related_work"),
      ("research_gaps", "gap_identification"),
      ("research_questions", "research_questions"),
      ("hypotheses", "hypotheses"),
      ("methodology", "methodology"),
      ("experiments", "experiments"),
      ("results_analysis", "results_analysis"),
      ("references", "references"),
    ],
  );
  paper.format = ArtifactFormat::Markdown;

  WorkflowDef {
    name: "research".to_string(),
    description: Some(
      "Summarize research papers, identify gaps and draft a follow-up paper".to_string(),
    ),
    stages: vec![
      StageDef::Batch(BatchDef {
        name: "paper_summary".to_string(),
        worker: PAPER_SUMMARIZER.to_string(),
        items: ItemsDef::Documents,
        format: ArtifactFormat::Json,
      }),
      StageDef::Group(GroupDef {
        name: "parallel_analysis".to_string(),
        steps: vec![
          MemberDef::Step(step(
            "related_work",
            RELATED_WORK,
            &[("summaries", "paper_summary")],
          )),
          MemberDef::Step(step(
            "gap_identification",
            GAP_IDENTIFIER,
            &[("summaries", "paper_summary")],
          )),
        ],
      }),
      StageDef::Step(step(
        "research_questions",
        QUESTION_GENERATOR,
        &[("related_work", "related_work"), ("gaps", "gap_identification")],
      )),
      StageDef::Step(step(
        "hypotheses",
        HYPOTHESIS_GENERATOR,
        &[
          ("questions", "research_questions"),
          ("related_work", "related_work"),
          ("gaps", "gap_identification"),
        ],
      )),
      StageDef::Step(step(
        "methodology",
        METHODOLOGY_PLANNER,
        &[("hypotheses", "hypotheses")],
      )),
      StageDef::Step(step(
        "system_design",
        SYSTEM_DESIGNER,
        &[("methodology", "methodology"), ("hypotheses", "hypotheses")],
      )),
      StageDef::Step(step(
        "experiments",
        EXPERIMENT_CONDUCTOR,
        &[
          ("system_design", "system_design"),
          ("hypotheses", "hypotheses"),
          ("related_work", "related_work"),
          ("gaps", "gap_identification"),
        ],
      )),
      StageDef::Step(step(
        "results_analysis",
        RESULTS_ANALYZER,
        &[
          ("hypotheses", "hypotheses"),
          ("system_design", "system_design"),
          ("experiment_results", "experiments"),
        ],
      )),
      StageDef::Step(step(
        "abstract",
        ABSTRACT_GENERATOR,
        &[
          ("questions", "research_questions"),
          ("system_design", "system_design"),
          ("results", "experiments"),
        ],
      )),
      StageDef::Step(step(
        "references",
        REFERENCE_GENERATOR,
        &[
          ("summary", "paper_summary"),
          ("related_work", "related_work"),
          ("gaps", "gap_identification"),
          ("questions", "research_questions"),
        ],
      )),
      StageDef::Step(paper),
    ],
  }
}
