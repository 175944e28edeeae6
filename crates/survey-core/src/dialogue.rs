//! Static dialogue graph: the complete state space and transition table of
//! the questionnaire, declared once as pure data.
//!
//! The graph is separate from any live session: a [`StateId`] is graph
//! identity, the per-user cursor lives in [`crate::session::Session`].
//! Ordinary nodes transition deterministically on a received token; the
//! pain-points subgraph is a diamond: six labeled branches (plus a
//! free-text "other") each with their own detail node, all converging on
//! `main_barrier`. Every node declares its semantic predecessor so that a
//! "back" press can re-render the exact prior prompt without replaying any
//! side effects.

use crate::error::EngineError;
use crate::validate::Field;

/// Reserved tokens handled by the engine rather than the transition table.
pub const TOKEN_BACK: &str = "back";
pub const TOKEN_NEXT: &str = "next";
pub const TOKEN_PREV: &str = "prev";
pub const TOKEN_CHOOSE: &str = "choose";
pub const TOKEN_OTHER: &str = "other";

/// Options per page when a node's option set is paged.
pub const PAGE_SIZE: usize = 3;

/// Identity of a dialogue node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    Consent,
    CompanyName,
    CompanyInn,
    FullName,
    Position,
    PhoneNumber,
    Email,
    ImplementationStage,
    PainPointsSelection,
    PainPointsOther,
    PainPointsFunctionalityDetails,
    PainPointsIntegrationDetails,
    PainPointsPersonnelDetails,
    PainPointsCompatibilityDetails,
    PainPointsCostsDetails,
    PainPointsSupportDetails,
    MainBarrier,
    DirectReplacement,
    DirectReplacementDetails,
    PilotTesting,
    SoftwareClasses,
    SoftwareClassesDetails,
    EventInterest,
    SolutionHelp,
    Completed,
    Cancelled,
    ConsentDeclined,
}

impl StateId {
    /// All states, in questionnaire order. Used for graph validation.
    pub const ALL: [StateId; 27] = [
        StateId::Consent,
        StateId::CompanyName,
        StateId::CompanyInn,
        StateId::FullName,
        StateId::Position,
        StateId::PhoneNumber,
        StateId::Email,
        StateId::ImplementationStage,
        StateId::PainPointsSelection,
        StateId::PainPointsOther,
        StateId::PainPointsFunctionalityDetails,
        StateId::PainPointsIntegrationDetails,
        StateId::PainPointsPersonnelDetails,
        StateId::PainPointsCompatibilityDetails,
        StateId::PainPointsCostsDetails,
        StateId::PainPointsSupportDetails,
        StateId::MainBarrier,
        StateId::DirectReplacement,
        StateId::DirectReplacementDetails,
        StateId::PilotTesting,
        StateId::SoftwareClasses,
        StateId::SoftwareClassesDetails,
        StateId::EventInterest,
        StateId::SolutionHelp,
        StateId::Completed,
        StateId::Cancelled,
        StateId::ConsentDeclined,
    ];

    /// Terminal states end the conversation; the session is cleared.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StateId::Completed | StateId::Cancelled | StateId::ConsentDeclined
        )
    }
}

/// A labeled button: what the user sees and the token the press sends back.
#[derive(Debug, Clone, Copy)]
pub struct Opt {
    pub label: &'static str,
    pub token: &'static str,
}

const fn opt(label: &'static str, token: &'static str) -> Opt {
    Opt { label, token }
}

/// Canonical questionnaire question collected by a node. `number` is the
/// natural key used for idempotent question resolution.
#[derive(Debug, Clone, Copy)]
pub struct QuestionDef {
    pub number: u32,
    pub text: &'static str,
}

/// A node of the dialogue graph.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub id: StateId,
    pub prompt: &'static str,
    /// Fixed option set shown as buttons (empty for free-text nodes).
    pub options: &'static [Opt],
    /// Where any option token leads unless overridden.
    pub next: Option<StateId>,
    /// Token-specific transition targets.
    pub overrides: &'static [(&'static str, StateId)],
    /// Free-text input: the validator applied and where acceptance leads.
    pub field: Option<Field>,
    pub text_next: Option<StateId>,
    /// Question whose answer this node's input supplies, if any.
    pub question: Option<QuestionDef>,
    /// Logical field name the collected value is stored under in the session.
    pub answer_key: Option<&'static str>,
    /// Semantic predecessor, independent of the runtime history stack.
    pub predecessor: Option<StateId>,
    /// Options are paged [`PAGE_SIZE`] at a time with next/prev tokens.
    pub paged: bool,
    /// Free-text answers are persisted as "other: {text}".
    pub other_prefix: bool,
}

/// One branch of the pain-points diamond.
#[derive(Debug, Clone, Copy)]
pub struct PainPoint {
    pub label: &'static str,
    pub description: &'static str,
    pub token: &'static str,
    pub detail: StateId,
}

/// The six categorized pain-point branches, in menu order.
pub const PAIN_POINTS: [PainPoint; 6] = [
    PainPoint {
        label: "Функционал",
        description: "(отсутствие нужного функционала для ваших систем/оборудования)",
        token: "functionality",
        detail: StateId::PainPointsFunctionalityDetails,
    },
    PainPoint {
        label: "Интеграция",
        description: "(уровень сложности интеграции ваших систем/оборудования с отечественным ПО)",
        token: "integration",
        detail: StateId::PainPointsIntegrationDetails,
    },
    PainPoint {
        label: "Кадры",
        description: "(доступность специалистов с опытом работы в нужном отечественном ПО)",
        token: "personnel",
        detail: StateId::PainPointsPersonnelDetails,
    },
    PainPoint {
        label: "Совместимость",
        description: "(острота проблемы совместимости отечественного ПО с вашим имеющимся ПО)",
        token: "compatibility",
        detail: StateId::PainPointsCompatibilityDetails,
    },
    PainPoint {
        label: "Затраты",
        description: "(направления затрат, которые вызывают наибольшее беспокойство)",
        token: "costs",
        detail: StateId::PainPointsCostsDetails,
    },
    PainPoint {
        label: "Техническая поддержка",
        description: "(важность уровня и скорости тех. поддержки)",
        token: "support",
        detail: StateId::PainPointsSupportDetails,
    },
];

const PAIN_POINTS_DETAIL_PROMPT: &str =
    "Основные направления «болей» с которыми столкнулось ваше предприятие?\n\nУкажите уровень:";

const MAIN_BARRIER_PROMPT: &str = "3. Что является главным барьером для перехода на отечественное ПО?\n\n\
- Недостаток функционала\n\
- Сложность интеграции\n\
- Отсутствие специалистов\n\
- Высокая стоимость\n\
- Риски для производства\n\
- Нестабильность вендора";

const IMPLEMENTATION_STAGE_OPTS: &[Opt] = &[
    opt("Планируем", "planning"),
    opt("Пилотный проект", "pilot"),
    opt("Активно внедряем", "active"),
    opt("Уже перешли", "completed"),
    opt("Пока не планируем", "not_planning"),
];

const PAIN_POINTS_OPTS: &[Opt] = &[
    opt("Функционал", "functionality"),
    opt("Интеграция", "integration"),
    opt("Кадры", "personnel"),
    opt("Совместимость", "compatibility"),
    opt("Затраты", "costs"),
    opt("Техническая поддержка", "support"),
];

const INTEGRATION_DETAILS_OPTS: &[Opt] = &[
    opt("Очень сложно", "very_hard"),
    opt("Сложно", "hard"),
    opt("Средне", "medium"),
    opt("Легко", "easy"),
    opt("Другое", "other_difficulty"),
];

const PERSONNEL_DETAILS_OPTS: &[Opt] = &[
    opt("Очень дефицит", "very_shortage"),
    opt("Дефицит", "shortage"),
    opt("Средне", "medium"),
    opt("Достаточно", "sufficient"),
    opt("Другое", "other_personnel"),
];

const COMPATIBILITY_DETAILS_OPTS: &[Opt] = &[
    opt("Критично", "critical"),
    opt("Серьезно", "serious"),
    opt("Умеренно", "moderate"),
    opt("Не актуально", "not_relevant"),
];

const COSTS_DETAILS_OPTS: &[Opt] = &[
    opt("Стоимость отечественного ПО", "software_cost"),
    opt("Миграция данных", "data_migration"),
    opt("Обучение персонала", "training"),
    opt("Доработка ПО под нужды предприятия", "customization"),
    opt("Аппаратное обновление", "hardware_upgrade"),
    opt("Простои производства", "downtime"),
    opt("Другое", "other_costs"),
];

const SUPPORT_DETAILS_OPTS: &[Opt] = &[
    opt("Очень беспокоит", "very_concerned"),
    opt("Беспокоит", "concerned"),
    opt("Удовлетворительно", "satisfactory"),
    opt("Не беспокоит", "not_concerned"),
];

const MAIN_BARRIER_OPTS: &[Opt] = &[
    opt("Недостаток функционала", "lack_func"),
    opt("Сложность интеграции", "complex_int"),
    opt("Отсутствие специалистов", "no_specs"),
    opt("Высокая стоимость", "high_cost"),
    opt("Риски для производства", "prod_risks"),
    opt("Нестабильность вендора", "vendor_inst"),
];

const DIRECT_REPLACEMENT_OPTS: &[Opt] = &[
    opt("Критично важно", "critical"),
    opt("Важно", "important"),
    opt("Желательно", "desirable"),
    opt("Не важно", "not_important"),
    opt("Можно", "possible"),
    opt("Другое", "other_repl"),
];

const SOFTWARE_CLASSES_OPTS: &[Opt] = &[
    opt("Операционные системы (Astra Linux, РЕД ОС)", "os"),
    opt("MES-системы (управление производством)", "mes"),
    opt("Инженерное ПО (САПР, PLM)", "eng"),
    opt("АСУ ТП (SCADA, HMI)", "asu"),
    opt("ERP-системы", "erp"),
    opt("Промышленный IoT и аналитика", "iot"),
    opt("Кибербезопасность АСУ ТП", "cyber"),
    opt("СУБД (Postgres Pro и др.)", "db"),
    opt("Интеграционные платформы", "int"),
    opt("BI-инструменты", "bi"),
    opt("Другое", "other"),
];

const YES_NO_DEPENDS_OPTS: &[Opt] = &[
    opt("Да", "yes"),
    opt("Нет", "no"),
    opt("Зависит от решения", "depends"),
];

const YES_NO_OPTS: &[Opt] = &[opt("Да", "yes"), opt("Нет", "no")];

/// Empty node template; every real node overrides what it needs.
const BASE: Node = Node {
    id: StateId::Consent,
    prompt: "",
    options: &[],
    next: None,
    overrides: &[],
    field: None,
    text_next: None,
    question: None,
    answer_key: None,
    predecessor: None,
    paged: false,
    other_prefix: false,
};

const Q1: QuestionDef = QuestionDef {
    number: 1,
    text: "1. На какой стадии перехода на отечественное ПО находится ваше предприятие?",
};
const Q3: QuestionDef = QuestionDef {
    number: 3,
    text: "3. Что является главным барьером для перехода на отечественное ПО?",
};
const Q4: QuestionDef = QuestionDef {
    number: 4,
    text: "4. Насколько важна для вас возможность прямого замещения зарубежного ПО на отечественное ПО?",
};
const Q4_OTHER: QuestionDef = QuestionDef {
    number: 4,
    text: "4. Насколько важна для вас возможность прямого замещения зарубежного ПО на отечественное ПО? (Другое)",
};
const Q5: QuestionDef = QuestionDef {
    number: 5,
    text: "5. Готовы ли вы выделить ресурсы (время специалистов, тестовый контур) для пилотного тестирования потенциальных российских решений?",
};
const Q6: QuestionDef = QuestionDef {
    number: 6,
    text: "6. Какие классы ПО вы бы хотели протестировать?",
};
const Q6_OTHER: QuestionDef = QuestionDef {
    number: 6,
    text: "6. Какие классы ПО вы бы хотели протестировать? (Другое)",
};
const Q7: QuestionDef = QuestionDef {
    number: 7,
    text: "7. Интересно ли вам участие в мероприятии, где можно пообщаться напрямую с разработчиками российского ПО?",
};
const Q8: QuestionDef = QuestionDef {
    number: 8,
    text: "8. Хотели бы вы, чтобы вам помогли подобрать российское решение под ваш профиль?",
};

const CONSENT: Node = Node {
    id: StateId::Consent,
    prompt: "Вы проходите опросник от АО «РНИЦ НСО» для сбора обратной связи. Согласны ли вы на обработку персональных данных вашей компании?",
    options: &[
        opt("Согласен", "consent_agree"),
        opt("Не согласен", "consent_disagree"),
    ],
    overrides: &[
        ("consent_agree", StateId::CompanyName),
        ("consent_disagree", StateId::ConsentDeclined),
    ],
    ..BASE
};

const COMPANY_NAME: Node = Node {
    id: StateId::CompanyName,
    prompt: "Введите полное название вашей компании или организации:",
    field: Some(Field::CompanyName),
    text_next: Some(StateId::CompanyInn),
    answer_key: Some("company_name"),
    predecessor: Some(StateId::Consent),
    ..BASE
};

const COMPANY_INN: Node = Node {
    id: StateId::CompanyInn,
    prompt: "Введите ИНН вашей компании:",
    field: Some(Field::TaxId),
    text_next: Some(StateId::FullName),
    answer_key: Some("company_inn"),
    predecessor: Some(StateId::CompanyName),
    ..BASE
};

const FULL_NAME: Node = Node {
    id: StateId::FullName,
    prompt: "Введите ваше ФИО (полностью):",
    field: Some(Field::FullName),
    text_next: Some(StateId::Position),
    answer_key: Some("full_name"),
    predecessor: Some(StateId::CompanyInn),
    ..BASE
};

const POSITION: Node = Node {
    id: StateId::Position,
    prompt: "Введите вашу должность:",
    field: Some(Field::Position),
    text_next: Some(StateId::PhoneNumber),
    answer_key: Some("position"),
    predecessor: Some(StateId::FullName),
    ..BASE
};

const PHONE_NUMBER: Node = Node {
    id: StateId::PhoneNumber,
    prompt: "Введите телефон для связи:",
    field: Some(Field::Phone),
    text_next: Some(StateId::Email),
    answer_key: Some("phone_number"),
    predecessor: Some(StateId::Position),
    ..BASE
};

const EMAIL: Node = Node {
    id: StateId::Email,
    prompt: "Введите email вашей компании для связи:",
    field: Some(Field::Email),
    text_next: Some(StateId::ImplementationStage),
    answer_key: Some("email"),
    predecessor: Some(StateId::PhoneNumber),
    ..BASE
};

const IMPLEMENTATION_STAGE: Node = Node {
    id: StateId::ImplementationStage,
    prompt: "1. На какой стадии перехода на отечественное ПО находится ваше предприятие?",
    options: IMPLEMENTATION_STAGE_OPTS,
    next: Some(StateId::PainPointsSelection),
    question: Some(Q1),
    answer_key: Some("implementation_stage"),
    predecessor: Some(StateId::Email),
    ..BASE
};

const PAIN_POINTS_SELECTION: Node = Node {
    id: StateId::PainPointsSelection,
    prompt: "2. Основные направления «болей» с которыми столкнулось ваше предприятие?",
    options: PAIN_POINTS_OPTS,
    overrides: &[
        ("functionality", StateId::PainPointsFunctionalityDetails),
        ("integration", StateId::PainPointsIntegrationDetails),
        ("personnel", StateId::PainPointsPersonnelDetails),
        ("compatibility", StateId::PainPointsCompatibilityDetails),
        ("costs", StateId::PainPointsCostsDetails),
        ("support", StateId::PainPointsSupportDetails),
        (TOKEN_OTHER, StateId::PainPointsOther),
    ],
    answer_key: Some("pain_points"),
    predecessor: Some(StateId::ImplementationStage),
    paged: true,
    ..BASE
};

const PAIN_POINTS_OTHER: Node = Node {
    id: StateId::PainPointsOther,
    prompt: "2. Введите основные направления «болей» с которыми столкнулось ваше предприятие",
    field: Some(Field::FreeText),
    text_next: Some(StateId::MainBarrier),
    question: Some(QuestionDef {
        number: 2,
        text: "2. Основные направления «болей» с которыми столкнулось ваше предприятие? (Другое)",
    }),
    answer_key: Some("pain_points_details"),
    predecessor: Some(StateId::PainPointsSelection),
    other_prefix: true,
    ..BASE
};

const PAIN_POINTS_FUNCTIONALITY_DETAILS: Node = Node {
    id: StateId::PainPointsFunctionalityDetails,
    prompt: "Основные направления «болей» с которыми столкнулось ваше предприятие?\n\nУкажите конкретные модули/процессы:",
    field: Some(Field::FreeText),
    text_next: Some(StateId::MainBarrier),
    question: Some(QuestionDef {
        number: 2,
        text: "2. Детали для Функционал: (отсутствие нужного функционала для ваших систем/оборудования)",
    }),
    answer_key: Some("pain_points_details"),
    predecessor: Some(StateId::PainPointsSelection),
    ..BASE
};

const PAIN_POINTS_INTEGRATION_DETAILS: Node = Node {
    id: StateId::PainPointsIntegrationDetails,
    prompt: PAIN_POINTS_DETAIL_PROMPT,
    options: INTEGRATION_DETAILS_OPTS,
    next: Some(StateId::MainBarrier),
    question: Some(QuestionDef {
        number: 2,
        text: "2. Детали для Интеграция: (уровень сложности интеграции ваших систем/оборудования с отечественным ПО)",
    }),
    answer_key: Some("pain_points_details"),
    predecessor: Some(StateId::PainPointsSelection),
    ..BASE
};

const PAIN_POINTS_PERSONNEL_DETAILS: Node = Node {
    id: StateId::PainPointsPersonnelDetails,
    prompt: PAIN_POINTS_DETAIL_PROMPT,
    options: PERSONNEL_DETAILS_OPTS,
    next: Some(StateId::MainBarrier),
    question: Some(QuestionDef {
        number: 2,
        text: "2. Детали для Кадры: (доступность специалистов с опытом работы в нужном отечественном ПО)",
    }),
    answer_key: Some("pain_points_details"),
    predecessor: Some(StateId::PainPointsSelection),
    ..BASE
};

const PAIN_POINTS_COMPATIBILITY_DETAILS: Node = Node {
    id: StateId::PainPointsCompatibilityDetails,
    prompt: PAIN_POINTS_DETAIL_PROMPT,
    options: COMPATIBILITY_DETAILS_OPTS,
    next: Some(StateId::MainBarrier),
    question: Some(QuestionDef {
        number: 2,
        text: "2. Детали для Совместимость: (острота проблемы совместимости отечественного ПО с вашим имеющимся ПО)",
    }),
    answer_key: Some("pain_points_details"),
    predecessor: Some(StateId::PainPointsSelection),
    ..BASE
};

const PAIN_POINTS_COSTS_DETAILS: Node = Node {
    id: StateId::PainPointsCostsDetails,
    prompt: PAIN_POINTS_DETAIL_PROMPT,
    options: COSTS_DETAILS_OPTS,
    next: Some(StateId::MainBarrier),
    question: Some(QuestionDef {
        number: 2,
        text: "2. Детали для Затраты: (направления затрат, которые вызывают наибольшее беспокойство)",
    }),
    answer_key: Some("pain_points_details"),
    predecessor: Some(StateId::PainPointsSelection),
    ..BASE
};

const PAIN_POINTS_SUPPORT_DETAILS: Node = Node {
    id: StateId::PainPointsSupportDetails,
    prompt: PAIN_POINTS_DETAIL_PROMPT,
    options: SUPPORT_DETAILS_OPTS,
    next: Some(StateId::MainBarrier),
    question: Some(QuestionDef {
        number: 2,
        text: "2. Детали для Техническая поддержка: (важность уровня и скорости тех. поддержки)",
    }),
    answer_key: Some("pain_points_details"),
    predecessor: Some(StateId::PainPointsSelection),
    ..BASE
};

const MAIN_BARRIER: Node = Node {
    id: StateId::MainBarrier,
    prompt: MAIN_BARRIER_PROMPT,
    options: MAIN_BARRIER_OPTS,
    next: Some(StateId::DirectReplacement),
    question: Some(Q3),
    answer_key: Some("main_barrier"),
    predecessor: Some(StateId::PainPointsSelection),
    ..BASE
};

const DIRECT_REPLACEMENT: Node = Node {
    id: StateId::DirectReplacement,
    prompt: "4. Насколько важна для вас возможность прямого замещения зарубежного ПО на отечественное ПО?",
    options: DIRECT_REPLACEMENT_OPTS,
    next: Some(StateId::PilotTesting),
    overrides: &[("other_repl", StateId::DirectReplacementDetails)],
    question: Some(Q4),
    answer_key: Some("direct_replacement"),
    predecessor: Some(StateId::MainBarrier),
    ..BASE
};

const DIRECT_REPLACEMENT_DETAILS: Node = Node {
    id: StateId::DirectReplacementDetails,
    prompt: "4. Введите насколько важна для вас возможность прямого замещения зарубежного ПО на отечественное ПО",
    field: Some(Field::FreeText),
    text_next: Some(StateId::PilotTesting),
    question: Some(Q4_OTHER),
    answer_key: Some("direct_replacement_details"),
    predecessor: Some(StateId::DirectReplacement),
    other_prefix: true,
    ..BASE
};

const PILOT_TESTING: Node = Node {
    id: StateId::PilotTesting,
    prompt: "5. Готовы ли вы выделить ресурсы (время специалистов, тестовый контур) для пилотного тестирования потенциальных российских решений?",
    options: YES_NO_DEPENDS_OPTS,
    next: Some(StateId::SoftwareClasses),
    question: Some(Q5),
    answer_key: Some("pilot_testing"),
    predecessor: Some(StateId::DirectReplacement),
    ..BASE
};

const SOFTWARE_CLASSES: Node = Node {
    id: StateId::SoftwareClasses,
    prompt: "6. Какие классы ПО вы бы хотели протестировать?\nВыберите один из вариантов:",
    options: SOFTWARE_CLASSES_OPTS,
    next: Some(StateId::EventInterest),
    overrides: &[(TOKEN_OTHER, StateId::SoftwareClassesDetails)],
    question: Some(Q6),
    answer_key: Some("software_classes"),
    predecessor: Some(StateId::PilotTesting),
    ..BASE
};

const SOFTWARE_CLASSES_DETAILS: Node = Node {
    id: StateId::SoftwareClassesDetails,
    prompt: "Введите какие классы ПО вы бы хотели протестировать",
    field: Some(Field::FreeText),
    text_next: Some(StateId::EventInterest),
    question: Some(Q6_OTHER),
    answer_key: Some("software_classes"),
    predecessor: Some(StateId::SoftwareClasses),
    other_prefix: true,
    ..BASE
};

const EVENT_INTEREST: Node = Node {
    id: StateId::EventInterest,
    prompt: "7. Интересно ли вам участие в мероприятии, где можно пообщаться напрямую с разработчиками российского ПО?",
    options: YES_NO_OPTS,
    next: Some(StateId::SolutionHelp),
    question: Some(Q7),
    answer_key: Some("event_interest"),
    predecessor: Some(StateId::SoftwareClasses),
    ..BASE
};

const SOLUTION_HELP: Node = Node {
    id: StateId::SolutionHelp,
    prompt: "8. Хотели бы вы, чтобы вам помогли подобрать российское решение под ваш профиль?",
    options: YES_NO_OPTS,
    next: Some(StateId::Completed),
    question: Some(Q8),
    answer_key: Some("solution_help"),
    predecessor: Some(StateId::EventInterest),
    ..BASE
};

const COMPLETED: Node = Node {
    id: StateId::Completed,
    prompt: "Спасибо, что прошли наш опрос!",
    ..BASE
};

const CANCELLED: Node = Node {
    id: StateId::Cancelled,
    prompt: "Опрос отменен.",
    ..BASE
};

const CONSENT_DECLINED: Node = Node {
    id: StateId::ConsentDeclined,
    prompt: "Вы не дали согласие на обработку персональных данных. Опрос завершен.\n\nДля повторного прохождения опроса нажмите «Меню» и выберите команду /start.",
    ..BASE
};

/// An outbound render: prompt text plus the option set to display.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Prompt {
    pub text: String,
    /// (label, token) pairs, in display order.
    pub options: Vec<(String, String)>,
    pub allow_back: bool,
    pub finished: bool,
}

impl Prompt {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
            allow_back: false,
            finished: false,
        }
    }
}

/// The static dialogue graph.
pub struct DialogueGraph;

impl DialogueGraph {
    /// Node descriptor for a state.
    pub fn node(id: StateId) -> &'static Node {
        match id {
            StateId::Consent => &CONSENT,
            StateId::CompanyName => &COMPANY_NAME,
            StateId::CompanyInn => &COMPANY_INN,
            StateId::FullName => &FULL_NAME,
            StateId::Position => &POSITION,
            StateId::PhoneNumber => &PHONE_NUMBER,
            StateId::Email => &EMAIL,
            StateId::ImplementationStage => &IMPLEMENTATION_STAGE,
            StateId::PainPointsSelection => &PAIN_POINTS_SELECTION,
            StateId::PainPointsOther => &PAIN_POINTS_OTHER,
            StateId::PainPointsFunctionalityDetails => &PAIN_POINTS_FUNCTIONALITY_DETAILS,
            StateId::PainPointsIntegrationDetails => &PAIN_POINTS_INTEGRATION_DETAILS,
            StateId::PainPointsPersonnelDetails => &PAIN_POINTS_PERSONNEL_DETAILS,
            StateId::PainPointsCompatibilityDetails => &PAIN_POINTS_COMPATIBILITY_DETAILS,
            StateId::PainPointsCostsDetails => &PAIN_POINTS_COSTS_DETAILS,
            StateId::PainPointsSupportDetails => &PAIN_POINTS_SUPPORT_DETAILS,
            StateId::MainBarrier => &MAIN_BARRIER,
            StateId::DirectReplacement => &DIRECT_REPLACEMENT,
            StateId::DirectReplacementDetails => &DIRECT_REPLACEMENT_DETAILS,
            StateId::PilotTesting => &PILOT_TESTING,
            StateId::SoftwareClasses => &SOFTWARE_CLASSES,
            StateId::SoftwareClassesDetails => &SOFTWARE_CLASSES_DETAILS,
            StateId::EventInterest => &EVENT_INTEREST,
            StateId::SolutionHelp => &SOLUTION_HELP,
            StateId::Completed => &COMPLETED,
            StateId::Cancelled => &CANCELLED,
            StateId::ConsentDeclined => &CONSENT_DECLINED,
        }
    }

    /// Computes the successor for a token press. Paging and "back" tokens are
    /// handled by the engine and never reach this function.
    pub fn next_state(current: StateId, token: &str) -> Result<StateId, EngineError> {
        let node = Self::node(current);
        if let Some(&(_, target)) = node.overrides.iter().find(|(t, _)| *t == token) {
            return Ok(target);
        }
        if let Some(target) = node.next {
            if node.options.iter().any(|o| o.token == token) {
                return Ok(target);
            }
        }
        Err(EngineError::InvalidTransition {
            state: current,
            token: token.to_string(),
        })
    }

    /// Label of the option with `token` on the given node, if any.
    pub fn option_label(id: StateId, token: &str) -> Option<&'static str> {
        Self::node(id)
            .options
            .iter()
            .find(|o| o.token == token)
            .map(|o| o.label)
    }

    /// Renders the prompt and option set for a node. For the paged
    /// pain-points node, `cursor` selects the view: `None` is the overview
    /// (branch list plus choose/other buttons), `Some(page)` is a
    /// [`PAGE_SIZE`]-sized window over the branch options with paging
    /// buttons. Rendering is pure: re-rendering after "back" fires no side
    /// effects.
    pub fn render(id: StateId, cursor: Option<usize>) -> Prompt {
        let node = Self::node(id);
        if node.paged {
            return Self::render_paged(node, cursor);
        }
        let mut prompt = Prompt::new(node.prompt);
        prompt.options = node
            .options
            .iter()
            .map(|o| (o.label.to_string(), o.token.to_string()))
            .collect();
        prompt.finished = id.is_terminal();
        prompt
    }

    fn render_paged(node: &Node, cursor: Option<usize>) -> Prompt {
        match cursor {
            None => {
                let listing = PAIN_POINTS
                    .iter()
                    .map(|p| format!("- {} {}", p.label, p.description))
                    .collect::<Vec<_>>()
                    .join("\n");
                let mut prompt = Prompt::new(format!(
                    "{}\n\n{}\n\nНажмите кнопку «Добавить», чтобы выбрать подходящий вариант. \
Если нужного варианта нет — используйте кнопку «Другое» и укажите свой вариант вручную.",
                    node.prompt, listing
                ));
                prompt.options = vec![
                    ("Добавить".to_string(), TOKEN_CHOOSE.to_string()),
                    ("Другое".to_string(), TOKEN_OTHER.to_string()),
                ];
                prompt
            }
            Some(page) => {
                let page = page.min(Self::last_page(node));
                let mut prompt = Prompt::new(format!(
                    "{}\nВыберите один из вариантов:",
                    node.prompt
                ));
                prompt.options = node
                    .options
                    .iter()
                    .skip(page * PAGE_SIZE)
                    .take(PAGE_SIZE)
                    .map(|o| (o.label.to_string(), o.token.to_string()))
                    .collect();
                if page > 0 {
                    prompt
                        .options
                        .push(("Назад".to_string(), TOKEN_PREV.to_string()));
                }
                if page < Self::last_page(node) {
                    prompt
                        .options
                        .push(("Вперёд".to_string(), TOKEN_NEXT.to_string()));
                }
                prompt
                    .options
                    .push(("Другое".to_string(), TOKEN_OTHER.to_string()));
                prompt
            }
        }
    }

    /// Index of the last page of a paged node's option set.
    pub fn last_page(node: &Node) -> usize {
        (node.options.len().max(1) - 1) / PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_state_is_reachable_from_consent() {
        let mut seen: HashSet<StateId> = HashSet::new();
        let mut queue = vec![StateId::Consent];
        while let Some(id) = queue.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = DialogueGraph::node(id);
            let mut targets: Vec<StateId> = node.overrides.iter().map(|&(_, t)| t).collect();
            if let Some(t) = node.next {
                targets.push(t);
            }
            if let Some(t) = node.text_next {
                targets.push(t);
            }
            queue.extend(targets);
        }
        // Cancelled is reached by command, not by graph transition.
        seen.insert(StateId::Cancelled);
        for id in StateId::ALL {
            assert!(seen.contains(&id), "{id:?} unreachable from Consent");
        }
    }

    #[test]
    fn every_non_initial_node_declares_a_predecessor() {
        for id in StateId::ALL {
            if id == StateId::Consent || id.is_terminal() {
                continue;
            }
            assert!(
                DialogueGraph::node(id).predecessor.is_some(),
                "{id:?} has no predecessor"
            );
        }
    }

    #[test]
    fn consent_transitions() {
        assert_eq!(
            DialogueGraph::next_state(StateId::Consent, "consent_agree").unwrap(),
            StateId::CompanyName
        );
        assert_eq!(
            DialogueGraph::next_state(StateId::Consent, "consent_disagree").unwrap(),
            StateId::ConsentDeclined
        );
        assert!(matches!(
            DialogueGraph::next_state(StateId::Consent, "bogus"),
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn pain_point_branches_converge_on_main_barrier() {
        for pain in PAIN_POINTS {
            let detail =
                DialogueGraph::next_state(StateId::PainPointsSelection, pain.token).unwrap();
            assert_eq!(detail, pain.detail);
            let node = DialogueGraph::node(detail);
            let converged = node.next.or(node.text_next).unwrap();
            assert_eq!(converged, StateId::MainBarrier, "{:?} diverges", pain.token);
        }
        // The free-text escape converges too.
        let other = DialogueGraph::next_state(StateId::PainPointsSelection, TOKEN_OTHER).unwrap();
        assert_eq!(
            DialogueGraph::node(other).text_next.unwrap(),
            StateId::MainBarrier
        );
    }

    #[test]
    fn other_replacement_detours_and_rejoins() {
        assert_eq!(
            DialogueGraph::next_state(StateId::DirectReplacement, "other_repl").unwrap(),
            StateId::DirectReplacementDetails
        );
        assert_eq!(
            DialogueGraph::next_state(StateId::DirectReplacement, "important").unwrap(),
            StateId::PilotTesting
        );
        assert_eq!(
            DialogueGraph::node(StateId::DirectReplacementDetails)
                .text_next
                .unwrap(),
            StateId::PilotTesting
        );
    }

    #[test]
    fn paged_render_windows_and_nav_tokens() {
        let overview = DialogueGraph::render(StateId::PainPointsSelection, None);
        assert!(overview.text.contains("Функционал"));
        let tokens: Vec<&str> = overview.options.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(tokens, [TOKEN_CHOOSE, TOKEN_OTHER]);

        let first = DialogueGraph::render(StateId::PainPointsSelection, Some(0));
        let tokens: Vec<&str> = first.options.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(
            tokens,
            ["functionality", "integration", "personnel", TOKEN_NEXT, TOKEN_OTHER]
        );

        let second = DialogueGraph::render(StateId::PainPointsSelection, Some(1));
        let tokens: Vec<&str> = second.options.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(
            tokens,
            ["compatibility", "costs", "support", TOKEN_PREV, TOKEN_OTHER]
        );
    }

    #[test]
    fn question_numbers_follow_the_canonical_order() {
        let expected = [
            (StateId::ImplementationStage, 1),
            (StateId::PainPointsOther, 2),
            (StateId::PainPointsFunctionalityDetails, 2),
            (StateId::PainPointsSupportDetails, 2),
            (StateId::MainBarrier, 3),
            (StateId::DirectReplacement, 4),
            (StateId::DirectReplacementDetails, 4),
            (StateId::PilotTesting, 5),
            (StateId::SoftwareClasses, 6),
            (StateId::SoftwareClassesDetails, 6),
            (StateId::EventInterest, 7),
            (StateId::SolutionHelp, 8),
        ];
        for (id, number) in expected {
            assert_eq!(DialogueGraph::node(id).question.unwrap().number, number);
        }
    }

    #[test]
    fn terminal_render_is_finished_and_optionless() {
        for id in [StateId::Completed, StateId::Cancelled, StateId::ConsentDeclined] {
            let prompt = DialogueGraph::render(id, None);
            assert!(prompt.finished);
            assert!(prompt.options.is_empty());
        }
    }
}
