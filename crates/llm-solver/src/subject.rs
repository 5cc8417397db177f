//! Academic subject detection and per-subject prompt settings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The subject a problem belongs to. Selects the wording of every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    ProbabilityStatistics,
    Calculus,
    LinearAlgebra,
    Physics,
    Chemistry,
    #[default]
    GeneralMath,
}

/// Prompt settings for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectConfig {
    pub id: SubjectType,
    pub name: &'static str,
    pub description: &'static str,
    /// Opening persona line of every prompt.
    pub system_context: &'static str,
    /// What to look for when restating the problem.
    pub problem_analysis_instructions: &'static str,
    /// Techniques the solution should lean on.
    pub solution_approach: &'static str,
    /// Extra requirements for generated snippets.
    pub verification_code_instructions: &'static str,
    pub common_concepts: &'static [&'static str],
}

impl SubjectType {
    pub const ALL: [SubjectType; 6] = [
        SubjectType::ProbabilityStatistics,
        SubjectType::Calculus,
        SubjectType::LinearAlgebra,
        SubjectType::Physics,
        SubjectType::Chemistry,
        SubjectType::GeneralMath,
    ];

    /// The identifier used on the wire.
    pub fn id(self) -> &'static str {
        match self {
            SubjectType::ProbabilityStatistics => "probability_statistics",
            SubjectType::Calculus => "calculus",
            SubjectType::LinearAlgebra => "linear_algebra",
            SubjectType::Physics => "physics",
            SubjectType::Chemistry => "chemistry",
            SubjectType::GeneralMath => "general_math",
        }
    }

    pub fn config(self) -> &'static SubjectConfig {
        match self {
            SubjectType::ProbabilityStatistics => &PROBABILITY_STATISTICS,
            SubjectType::Calculus => &CALCULUS,
            SubjectType::LinearAlgebra => &LINEAR_ALGEBRA,
            SubjectType::Physics => &PHYSICS,
            SubjectType::Chemistry => &CHEMISTRY,
            SubjectType::GeneralMath => &GENERAL_MATH,
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config().name)
    }
}

static PROBABILITY_STATISTICS: SubjectConfig = SubjectConfig {
    id: SubjectType::ProbabilityStatistics,
    name: "Probability & Statistics",
    description: "Probability theory, distributions, statistical inference and data interpretation",
    system_context: "You are an expert in probability and statistics.",
    problem_analysis_instructions: "Identify the sample space, events, random variables, distributions and any statistical measures the problem gives or asks for.",
    solution_approach: "Use probability rules, counting arguments, distribution formulas and statistical techniques such as hypothesis tests and confidence intervals.",
    verification_code_instructions: "Compute the probabilities or statistics directly, for example by summing distribution terms or enumerating outcomes.",
    common_concepts: &[
        "probability distributions",
        "random variables",
        "expected value",
        "variance",
        "hypothesis testing",
        "confidence intervals",
        "binomial distribution",
        "normal distribution",
        "Poisson distribution",
    ],
};

static CALCULUS: SubjectConfig = SubjectConfig {
    id: SubjectType::Calculus,
    name: "Calculus",
    description: "Limits, derivatives, integrals and their applications",
    system_context: "You are an expert in calculus and mathematical analysis.",
    problem_analysis_instructions: "Identify the functions, variables, limits, derivatives and integrals involved, and whether the task is optimization, related rates or an area/volume computation.",
    solution_approach: "Apply differentiation and integration rules (chain, product and quotient rules, substitution, integration by parts) and the fundamental theorem of calculus.",
    verification_code_instructions: "Check results numerically, for example with finite differences for derivatives or a fine Riemann/Simpson sum for integrals.",
    common_concepts: &[
        "limits",
        "derivatives",
        "integrals",
        "chain rule",
        "optimization",
        "related rates",
        "Taylor series",
    ],
};

static LINEAR_ALGEBRA: SubjectConfig = SubjectConfig {
    id: SubjectType::LinearAlgebra,
    name: "Linear Algebra",
    description: "Vectors, matrices, linear maps and vector spaces",
    system_context: "You are an expert in linear algebra and matrix theory.",
    problem_analysis_instructions: "Identify the vectors, matrices, linear systems and transformations involved, and any question about rank, determinants, eigenvalues or independence.",
    solution_approach: "Use matrix operations, row reduction, determinants and eigen-decomposition, reasoning about basis, span and dimension where needed.",
    verification_code_instructions: "Represent matrices as nested arrays and implement the needed operations (products, determinants, elimination) explicitly.",
    common_concepts: &[
        "vectors",
        "matrices",
        "determinants",
        "eigenvalues",
        "eigenvectors",
        "linear independence",
        "basis",
    ],
};

static PHYSICS: SubjectConfig = SubjectConfig {
    id: SubjectType::Physics,
    name: "Physics",
    description: "Mechanics, thermodynamics, electromagnetism and waves",
    system_context: "You are an expert in physics with a deep understanding of physical laws and mathematical modeling.",
    problem_analysis_instructions: "Identify the physical quantities and their units, the forces and energies involved, and the laws or conservation principles that apply.",
    solution_approach: "Apply the governing physical laws and conservation principles, and keep track of units throughout.",
    verification_code_instructions: "Implement the physics formulas with explicit constants and consistent SI units.",
    common_concepts: &[
        "kinematics",
        "dynamics",
        "energy",
        "momentum",
        "electric fields",
        "thermodynamics",
        "Newton's laws",
    ],
};

static CHEMISTRY: SubjectConfig = SubjectConfig {
    id: SubjectType::Chemistry,
    name: "Chemistry",
    description: "Reactions, stoichiometry, equilibria and thermochemistry",
    system_context: "You are an expert in chemistry with comprehensive knowledge of chemical principles and calculations.",
    problem_analysis_instructions: "Identify the chemical species, reactions, stoichiometric ratios, concentrations and equilibrium conditions.",
    solution_approach: "Apply stoichiometry, equilibrium expressions and thermochemical relations, converting units where needed.",
    verification_code_instructions: "Compute amounts, concentrations and equilibrium values step by step with explicit unit conversions.",
    common_concepts: &[
        "stoichiometry",
        "molarity",
        "chemical equilibrium",
        "reaction rates",
        "acid-base chemistry",
        "gas laws",
    ],
};

static GENERAL_MATH: SubjectConfig = SubjectConfig {
    id: SubjectType::GeneralMath,
    name: "General Mathematics",
    description: "Algebra, geometry, number theory and discrete mathematics",
    system_context: "You are an expert mathematician with broad knowledge across mathematical disciplines.",
    problem_analysis_instructions: "Identify the mathematical structures, equations, geometric relationships and constraints in the problem.",
    solution_approach: "Use algebraic manipulation, geometric reasoning, logical deduction and computation as appropriate.",
    verification_code_instructions: "Compute the answer directly and check it against the constraints of the problem.",
    common_concepts: &[
        "algebra",
        "geometry",
        "trigonometry",
        "number theory",
        "combinatorics",
        "set theory",
    ],
};

const PHYSICS_KEYWORDS: &[&str] = &[
    "force", "velocity", "acceleration", "energy", "momentum", "electric", "magnetic", "wave",
    "frequency", "mass", "newton", "joule", "watt", "volt", "ampere", "field", "motion",
    "gravity", "friction", "pressure", "temperature", "heat", "work", "power",
];

const CHEMISTRY_KEYWORDS: &[&str] = &[
    "molecule", "atom", "reaction", "mole", "molarity", "concentration", "equilibrium", "acid",
    "base", "ph", "oxidation", "reduction", "catalyst", "bond", "electron", "proton", "neutron",
    "compound", "element", "solution", "solvent", "solute",
];

const CALCULUS_KEYWORDS: &[&str] = &[
    "derivative", "integral", "limit", "differentiate", "integrate", "optimization", "maximum",
    "minimum", "rate of change", "area under", "volume", "tangent", "slope", "continuous",
    "discontinuous",
];

const LINEAR_ALGEBRA_KEYWORDS: &[&str] = &[
    "matrix", "vector", "determinant", "eigenvalue", "eigenvector", "linear transformation",
    "basis", "dimension", "span", "linear independence", "dot product", "cross product",
];

const PROBABILITY_STATISTICS_KEYWORDS: &[&str] = &[
    "probability", "statistics", "random", "distribution", "mean", "median", "mode",
    "variance", "standard deviation", "correlation", "regression", "hypothesis",
    "confidence interval", "sample", "population", "normal distribution", "binomial",
    "poisson",
];

/// Guesses the subject of `problem` by counting keyword hits.
///
/// Keywords match as plain substrings of the lowercased text. The subject
/// with the most hits wins; ties go to the earlier entry of physics,
/// chemistry, calculus, linear algebra, probability & statistics. No hits at
/// all gives [`SubjectType::GeneralMath`].
///
/// ```
/// use llm_solver::subject::{SubjectType, detect_subject};
///
/// assert_eq!(
///     detect_subject("What is the probability of 7 heads in 10 tosses?"),
///     SubjectType::ProbabilityStatistics
/// );
/// assert_eq!(detect_subject("Simplify 3x + 2x"), SubjectType::GeneralMath);
/// ```
pub fn detect_subject(problem: &str) -> SubjectType {
    let text = problem.to_lowercase();
    let candidates = [
        (SubjectType::Physics, PHYSICS_KEYWORDS),
        (SubjectType::Chemistry, CHEMISTRY_KEYWORDS),
        (SubjectType::Calculus, CALCULUS_KEYWORDS),
        (SubjectType::LinearAlgebra, LINEAR_ALGEBRA_KEYWORDS),
        (SubjectType::ProbabilityStatistics, PROBABILITY_STATISTICS_KEYWORDS),
    ];

    let mut best = (SubjectType::GeneralMath, 0);
    for (subject, keywords) in candidates {
        let hits = keywords.iter().filter(|k| text.contains(*k)).count();
        if hits > best.1 {
            best = (subject, hits);
        }
    }
    log::debug!("Detected subject {:?} ({} keyword hits)", best.0, best.1);
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_each_subject() {
        assert_eq!(
            detect_subject("Find the derivative of x^2 and its integral"),
            SubjectType::Calculus
        );
        assert_eq!(
            detect_subject("Compute the determinant and eigenvalue of the matrix"),
            SubjectType::LinearAlgebra
        );
        assert_eq!(
            detect_subject("A car's velocity and acceleration under friction"),
            SubjectType::Physics
        );
        assert_eq!(
            detect_subject("Balance the reaction and find the molarity of the acid"),
            SubjectType::Chemistry
        );
    }

    #[test]
    fn test_tie_prefers_physics_over_probability() {
        // "energy" for physics, "random" for probability: one hit each.
        assert_eq!(detect_subject("random energy"), SubjectType::Physics);
    }

    #[test]
    fn test_no_hits_is_general_math() {
        assert_eq!(detect_subject("What is 17 * 23?"), SubjectType::GeneralMath);
        assert_eq!(detect_subject(""), SubjectType::GeneralMath);
    }

    #[test]
    fn test_config_ids_match_serde() {
        for subject in SubjectType::ALL {
            let json = serde_json::to_string(&subject).unwrap();
            assert_eq!(json, format!("\"{}\"", subject.id()));
            assert_eq!(subject.config().id, subject);
        }
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(SubjectType::LinearAlgebra.to_string(), "Linear Algebra");
    }
}
